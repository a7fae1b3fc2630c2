//! Wire codec for the two-channel e-stim device protocol.
//!
//! This is the pure protocol layer. It knows the three fixed-layout frame
//! types and nothing else:
//! - Strength frames (0xB0, 20 bytes) — per-tick strength and waveform data
//! - Limit frames (0xBF, 7 bytes) — soft output limits and balance tuning
//! - Status frames (0xB1, ≥4 bytes) — device acknowledgments
//!
//! Every field is range-checked before a single byte is produced. No
//! connection state, no callbacks, no business logic.

pub mod codec;
pub mod error;
pub mod freq;
pub mod types;

pub use codec::{
    decode_limit_frame, decode_status_frame, decode_strength_frame, encode_limit_frame,
    encode_strength_frame, LimitFrame, StatusFrame, StrengthFrame, LIMIT_FRAME_LEN,
    LIMIT_FRAME_TAG, PULSE_FREQUENCY_MAX, PULSE_FREQUENCY_MIN, PULSE_STRENGTH_MAX,
    SEQUENCE_NO_MAX, STATUS_FRAME_MIN_LEN, STATUS_FRAME_TAG, STRENGTH_FRAME_LEN,
    STRENGTH_FRAME_TAG, STRENGTH_MAX,
};
pub use error::{ProtoError, Result};
pub use freq::{clamp_frequency, clamp_pulse_strength, hz_to_protocol};
pub use types::{
    pack_parsing_methods, unpack_parsing_methods, Channel, FrequencyQuad, ParsingMethod,
    PulseOperation, StrengthQuad,
};
