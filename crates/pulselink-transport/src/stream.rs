//! Shared I/O plumbing for stream-backed adapters.
//!
//! Each adapter owns a writer task draining the outbound queue and a reader
//! task decoding inbound frames into the notification channel. The adapter
//! handle itself never touches the socket.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::framing::{decode_frame, encode_frame};

const OUTBOUND_QUEUE_DEPTH: usize = 64;
const NOTIFY_QUEUE_DEPTH: usize = 64;
const READ_CHUNK: usize = 4 * 1024;

/// Queue handles plus the tasks moving bytes for one connected stream.
pub struct StreamIo {
    outbound: mpsc::Sender<Bytes>,
    notifications: Option<mpsc::Receiver<Bytes>>,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamIo {
    /// Spawn the reader/writer tasks for a split stream.
    pub fn spawn<R, W>(reader: R, writer: W, name: &'static str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_QUEUE_DEPTH);

        let writer_task = tokio::spawn(write_loop(writer, outbound_rx, name));
        let reader_task = tokio::spawn(read_loop(reader, notify_tx, name));

        Self {
            outbound,
            notifications: Some(notify_rx),
            tasks: vec![writer_task, reader_task],
        }
    }

    /// Queue one frame for transmission.
    pub fn send(&self, frame: Bytes) -> Result<()> {
        self.outbound.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::ChannelClosed,
        })
    }

    /// Take the inbound notification stream.
    pub fn take_notifications(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.notifications.take()
    }
}

impl Drop for StreamIo {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Bytes>, name: &'static str)
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    while let Some(frame) = outbound.recv().await {
        buf.clear();
        if let Err(err) = encode_frame(&frame, &mut buf) {
            warn!(transport = name, %err, "dropping unframeable payload");
            continue;
        }
        if let Err(err) = writer.write_all(&buf).await {
            warn!(transport = name, %err, "transport write failed");
            break;
        }
    }
    debug!(transport = name, "writer task stopped");
}

async fn read_loop<R>(mut reader: R, notify: mpsc::Sender<Bytes>, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        match decode_frame(&mut buf) {
            Ok(Some(payload)) => {
                if notify.send(payload).await.is_err() {
                    break; // Session gone
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(transport = name, %err, "inbound stream desynchronized");
                break;
            }
        }

        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!(transport = name, "inbound stream closed");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(transport = name, %err, "transport read failed");
                break;
            }
        }
    }
}
