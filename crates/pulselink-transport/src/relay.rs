use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Result, TransportError};
use crate::stream::StreamIo;
use crate::traits::TransportAdapter;

/// Relayed socket connection: TCP to a relay endpoint that forwards command
/// frames to the device and notification frames back.
pub struct RelayTransport {
    io: StreamIo,
}

impl RelayTransport {
    /// Connect to a relay endpoint (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                target: addr.to_string(),
                source,
            })?;
        // 100ms cadence frames must not sit in Nagle buffers.
        stream.set_nodelay(true)?;
        info!(addr, "connected to relay");

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            io: StreamIo::spawn(read_half, write_half, "relay"),
        })
    }
}

impl TransportAdapter for RelayTransport {
    fn transport_name(&self) -> &'static str {
        "socket-relay"
    }

    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.io.send(frame)
    }

    fn take_notifications(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.io.take_notifications()
    }
}
