use std::path::Path;

use bytes::Bytes;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Result, TransportError};
use crate::stream::StreamIo;
use crate::traits::TransportAdapter;

/// Short-range wireless link, reached through the local bridge daemon's
/// Unix-domain socket.
///
/// The bridge owns the radio; this adapter just moves framed device commands
/// to it and notification payloads back.
pub struct BridgeTransport {
    io: StreamIo,
}

impl BridgeTransport {
    /// Connect to the bridge daemon socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| TransportError::Connect {
                target: path.display().to_string(),
                source,
            })?;
        info!(?path, "connected to wireless bridge");

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            io: StreamIo::spawn(read_half, write_half, "bridge"),
        })
    }
}

impl TransportAdapter for BridgeTransport {
    fn transport_name(&self) -> &'static str {
        "wireless-bridge"
    }

    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.io.send(frame)
    }

    fn take_notifications(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.io.take_notifications()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use crate::framing::{decode_frame, encode_frame};

    #[tokio::test]
    async fn bridge_sends_and_receives_framed_payloads() {
        let dir = std::env::temp_dir().join(format!("pulselink-bridge-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("bridge.sock");

        let listener = UnixListener::bind(&sock_path).unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            // Read the client's framed command.
            let mut buf = BytesMut::new();
            let payload = loop {
                if let Some(frame) = decode_frame(&mut buf).unwrap() {
                    break frame;
                }
                stream.read_buf(&mut buf).await.unwrap();
            };
            assert_eq!(payload.as_ref(), &[0xB0, 0, 0, 0]);

            // Answer with a status notification.
            let mut out = BytesMut::new();
            encode_frame(&[0xB1, 3, 15, 25], &mut out).unwrap();
            stream.write_all(&out).await.unwrap();
        });

        let mut transport = BridgeTransport::connect(&sock_path).await.unwrap();
        assert_eq!(transport.transport_name(), "wireless-bridge");

        transport.send(Bytes::from_static(&[0xB0, 0, 0, 0])).unwrap();
        let mut notifications = transport.take_notifications().unwrap();
        let status = notifications.recv().await.unwrap();
        assert_eq!(status.as_ref(), &[0xB1, 3, 15, 25]);

        server.await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn connect_fails_for_missing_socket() {
        let result = BridgeTransport::connect("/nonexistent/pulselink.sock").await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
