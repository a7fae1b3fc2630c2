/// Errors that can occur in device transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the transport endpoint.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload exceeds the stream framing cap.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The stream lost framing synchronization.
    #[error("invalid stream magic (expected 0x50 0x4C \"PL\")")]
    InvalidMagic,

    /// The adapter's I/O task has shut down.
    #[error("transport channel closed")]
    ChannelClosed,

    /// The outbound queue is full; the frame was dropped.
    #[error("outbound queue full, frame dropped")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, TransportError>;
