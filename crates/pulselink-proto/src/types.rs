use serde::{Deserialize, Serialize};

/// One of the two independent output lines on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Both channels, in wire order.
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// Stable index (A=0, B=1) for per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

/// Four waveform frequency values in protocol units (10-240).
pub type FrequencyQuad = [u8; 4];

/// Four waveform strength values (0-100).
pub type StrengthQuad = [u8; 4];

/// One 100ms waveform instruction unit: a frequency quad and a strength quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseOperation {
    pub frequency: FrequencyQuad,
    pub strength: StrengthQuad,
}

impl PulseOperation {
    /// The neutral "no output" pulse sent when a channel has no data.
    pub const NEUTRAL: PulseOperation = PulseOperation {
        frequency: [10, 10, 10, 10],
        strength: [0, 0, 0, 0],
    };

    pub fn new(frequency: FrequencyQuad, strength: StrengthQuad) -> Self {
        Self {
            frequency,
            strength,
        }
    }
}

/// How the device interprets a strength field in a strength frame (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParsingMethod {
    NoChange = 0b00,
    Increase = 0b01,
    Decrease = 0b10,
    Absolute = 0b11,
}

impl ParsingMethod {
    /// Decode from a 2-bit field. Only the low two bits are significant.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => ParsingMethod::NoChange,
            0b01 => ParsingMethod::Increase,
            0b10 => ParsingMethod::Decrease,
            _ => ParsingMethod::Absolute,
        }
    }
}

/// Pack the per-channel parsing methods into the shared 4-bit field.
pub fn pack_parsing_methods(method_a: ParsingMethod, method_b: ParsingMethod) -> u8 {
    ((method_a as u8) << 2) | method_b as u8
}

/// Split the shared 4-bit field back into per-channel parsing methods.
pub fn unpack_parsing_methods(nibble: u8) -> (ParsingMethod, ParsingMethod) {
    (
        ParsingMethod::from_bits((nibble >> 2) & 0b11),
        ParsingMethod::from_bits(nibble & 0b11),
    )
}
