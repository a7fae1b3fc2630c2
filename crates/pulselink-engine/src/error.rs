use pulselink_proto::Channel;

/// Errors that can occur in engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Protocol-level error.
    #[error("protocol error: {0}")]
    Proto(#[from] pulselink_proto::ProtoError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pulselink_transport::TransportError),

    /// A requested channel strength leaves the device domain.
    #[error("channel {channel} strength out of range: {requested} (expected 0..=200)")]
    StrengthOutOfRange { channel: Channel, requested: i32 },
}

pub type Result<T> = std::result::Result<T, EngineError>;
