use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// A connected device transport.
///
/// Outbound: [`send`](TransportAdapter::send) queues one encoded command
/// frame; the adapter's I/O task puts it on the wire. Best-effort: a failed
/// send is reported but never fatal to the caller's streaming loop.
///
/// Inbound: the adapter decodes device notifications off the wire and feeds
/// them into a channel the session takes once via
/// [`take_notifications`](TransportAdapter::take_notifications).
pub trait TransportAdapter: Send + 'static {
    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;

    /// Queue one encoded command frame for transmission to the device.
    fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Take the inbound notification stream. Returns `None` once taken.
    fn take_notifications(&mut self) -> Option<mpsc::Receiver<Bytes>>;
}
