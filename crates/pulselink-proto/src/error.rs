/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// A frame field is outside its protocol range.
    #[error("{field} out of range: {value} (expected {min}..={max})")]
    FieldOutOfRange {
        field: &'static str,
        value: u16,
        min: u16,
        max: u16,
    },

    /// The payload does not start with the expected frame tag.
    #[error("unexpected frame tag 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedTag { expected: u8, actual: u8 },

    /// The payload is shorter than the frame layout requires.
    #[error("truncated frame: {actual} bytes (need {expected})")]
    Truncated { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
