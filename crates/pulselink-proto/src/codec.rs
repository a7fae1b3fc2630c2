use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{ProtoError, Result};
use crate::types::{
    pack_parsing_methods, unpack_parsing_methods, ParsingMethod, PulseOperation,
};

/// Strength frame tag byte.
pub const STRENGTH_FRAME_TAG: u8 = 0xB0;
/// Limit frame tag byte.
pub const LIMIT_FRAME_TAG: u8 = 0xBF;
/// Status frame tag byte.
pub const STATUS_FRAME_TAG: u8 = 0xB1;

/// Strength frame wire size.
pub const STRENGTH_FRAME_LEN: usize = 20;
/// Limit frame wire size.
pub const LIMIT_FRAME_LEN: usize = 7;
/// Minimum status frame wire size; trailing bytes are tolerated.
pub const STATUS_FRAME_MIN_LEN: usize = 4;

/// Maximum channel strength and soft limit (device units).
pub const STRENGTH_MAX: u8 = 200;
/// Maximum rotating sequence number (4 bits).
pub const SEQUENCE_NO_MAX: u8 = 15;
/// Waveform frequency bounds, protocol units.
pub const PULSE_FREQUENCY_MIN: u8 = 10;
pub const PULSE_FREQUENCY_MAX: u8 = 240;
/// Maximum waveform strength value.
pub const PULSE_STRENGTH_MAX: u8 = 100;

/// One strength frame: per-tick channel strengths plus a waveform unit for
/// each channel.
///
/// Wire layout (20 bytes):
/// ```text
/// ┌───────┬──────────────┬───────┬───────┬─────────┬─────────┬─────────┬─────────┐
/// │ 0xB0  │ seq│methods  │ strA  │ strB  │ freqA×4 │ strA×4  │ freqB×4 │ strB×4  │
/// │ (1B)  │ (4b)│(4b)    │ (1B)  │ (1B)  │ (4B)    │ (4B)    │ (4B)    │ (4B)    │
/// └───────┴──────────────┴───────┴───────┴─────────┴─────────┴─────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrengthFrame {
    /// Rotating request correlation id (0 = not a strength-change request).
    pub sequence_no: u8,
    pub method_a: ParsingMethod,
    pub method_b: ParsingMethod,
    /// Channel strength fields; interpretation depends on the parsing method.
    pub strength_a: u8,
    pub strength_b: u8,
    pub pulse_a: PulseOperation,
    pub pulse_b: PulseOperation,
}

/// One limit frame: soft output limits and device-internal balance tuning.
///
/// The balance bytes are opaque device parameters; this layer only carries
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitFrame {
    pub limit_a: u8,
    pub limit_b: u8,
    pub freq_balance_a: u8,
    pub freq_balance_b: u8,
    pub strength_balance_a: u8,
    pub strength_balance_b: u8,
}

/// One decoded status frame: the device's acknowledgment of a strength
/// request plus its authoritative channel strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusFrame {
    pub sequence_no: u8,
    pub strength_a: u8,
    pub strength_b: u8,
}

/// Encode a strength frame.
///
/// Every field is validated before any byte is produced; on failure nothing
/// must be sent.
pub fn encode_strength_frame(frame: &StrengthFrame) -> Result<Bytes> {
    check_range("sequence_no", frame.sequence_no, 0, SEQUENCE_NO_MAX)?;
    check_range("strength_a", frame.strength_a, 0, STRENGTH_MAX)?;
    check_range("strength_b", frame.strength_b, 0, STRENGTH_MAX)?;
    check_pulse("pulse_a", &frame.pulse_a)?;
    check_pulse("pulse_b", &frame.pulse_b)?;

    let mut buf = BytesMut::with_capacity(STRENGTH_FRAME_LEN);
    buf.put_u8(STRENGTH_FRAME_TAG);
    buf.put_u8((frame.sequence_no << 4) | pack_parsing_methods(frame.method_a, frame.method_b));
    buf.put_u8(frame.strength_a);
    buf.put_u8(frame.strength_b);
    buf.put_slice(&frame.pulse_a.frequency);
    buf.put_slice(&frame.pulse_a.strength);
    buf.put_slice(&frame.pulse_b.frequency);
    buf.put_slice(&frame.pulse_b.strength);
    Ok(buf.freeze())
}

/// Decode a strength frame (round-trip support and diagnostics).
pub fn decode_strength_frame(data: &[u8]) -> Result<StrengthFrame> {
    check_len(STRENGTH_FRAME_LEN, data.len())?;
    check_tag(STRENGTH_FRAME_TAG, data[0])?;

    let (method_a, method_b) = unpack_parsing_methods(data[1] & 0x0F);
    Ok(StrengthFrame {
        sequence_no: (data[1] >> 4) & 0x0F,
        method_a,
        method_b,
        strength_a: data[2],
        strength_b: data[3],
        pulse_a: PulseOperation {
            frequency: quad(&data[4..8]),
            strength: quad(&data[8..12]),
        },
        pulse_b: PulseOperation {
            frequency: quad(&data[12..16]),
            strength: quad(&data[16..20]),
        },
    })
}

/// Encode a limit frame.
///
/// Limits are device strength units (0-200); balance bytes use the full u8
/// domain and are passed through unvalidated.
pub fn encode_limit_frame(frame: &LimitFrame) -> Result<Bytes> {
    check_range("limit_a", frame.limit_a, 0, STRENGTH_MAX)?;
    check_range("limit_b", frame.limit_b, 0, STRENGTH_MAX)?;

    let mut buf = BytesMut::with_capacity(LIMIT_FRAME_LEN);
    buf.put_u8(LIMIT_FRAME_TAG);
    buf.put_u8(frame.limit_a);
    buf.put_u8(frame.limit_b);
    buf.put_u8(frame.freq_balance_a);
    buf.put_u8(frame.freq_balance_b);
    buf.put_u8(frame.strength_balance_a);
    buf.put_u8(frame.strength_balance_b);
    Ok(buf.freeze())
}

/// Decode a limit frame.
pub fn decode_limit_frame(data: &[u8]) -> Result<LimitFrame> {
    check_len(LIMIT_FRAME_LEN, data.len())?;
    check_tag(LIMIT_FRAME_TAG, data[0])?;

    Ok(LimitFrame {
        limit_a: data[1],
        limit_b: data[2],
        freq_balance_a: data[3],
        freq_balance_b: data[4],
        strength_balance_a: data[5],
        strength_balance_b: data[6],
    })
}

/// Decode a status frame. Payloads longer than four bytes are accepted; the
/// device appends fields this layer does not interpret.
pub fn decode_status_frame(data: &[u8]) -> Result<StatusFrame> {
    if data.len() < STATUS_FRAME_MIN_LEN {
        return Err(ProtoError::Truncated {
            expected: STATUS_FRAME_MIN_LEN,
            actual: data.len(),
        });
    }
    check_tag(STATUS_FRAME_TAG, data[0])?;

    Ok(StatusFrame {
        sequence_no: data[1],
        strength_a: data[2],
        strength_b: data[3],
    })
}

fn check_range(field: &'static str, value: u8, min: u8, max: u8) -> Result<()> {
    if value < min || value > max {
        return Err(ProtoError::FieldOutOfRange {
            field,
            value: value as u16,
            min: min as u16,
            max: max as u16,
        });
    }
    Ok(())
}

fn check_pulse(field: &'static str, pulse: &PulseOperation) -> Result<()> {
    for value in pulse.frequency {
        check_range(field, value, PULSE_FREQUENCY_MIN, PULSE_FREQUENCY_MAX)?;
    }
    for value in pulse.strength {
        check_range(field, value, 0, PULSE_STRENGTH_MAX)?;
    }
    Ok(())
}

fn check_tag(expected: u8, actual: u8) -> Result<()> {
    if actual != expected {
        return Err(ProtoError::UnexpectedTag { expected, actual });
    }
    Ok(())
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(ProtoError::Truncated { expected, actual });
    }
    Ok(())
}

fn quad(data: &[u8]) -> [u8; 4] {
    [data[0], data[1], data[2], data[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> StrengthFrame {
        StrengthFrame {
            sequence_no: 5,
            method_a: ParsingMethod::Increase,
            method_b: ParsingMethod::Absolute,
            strength_a: 42,
            strength_b: 128,
            pulse_a: PulseOperation::new([10, 20, 30, 40], [0, 25, 50, 100]),
            pulse_b: PulseOperation::new([240, 120, 60, 10], [100, 75, 25, 0]),
        }
    }

    #[test]
    fn strength_frame_roundtrip() {
        let frame = sample_frame();
        let bytes = encode_strength_frame(&frame).unwrap();
        assert_eq!(bytes.len(), STRENGTH_FRAME_LEN);
        assert_eq!(bytes[0], STRENGTH_FRAME_TAG);
        assert_eq!(decode_strength_frame(&bytes).unwrap(), frame);
    }

    #[test]
    fn strength_frame_wire_layout() {
        let bytes = encode_strength_frame(&sample_frame()).unwrap();
        // byte1 = (seq << 4) | (method_a << 2) | method_b
        assert_eq!(bytes[1], (5 << 4) | (0b01 << 2) | 0b11);
        assert_eq!(bytes[2], 42);
        assert_eq!(bytes[3], 128);
        assert_eq!(&bytes[4..8], &[10, 20, 30, 40]);
        assert_eq!(&bytes[16..20], &[100, 75, 25, 0]);
    }

    #[test]
    fn strength_field_full_domain() {
        for strength in 0..=STRENGTH_MAX {
            let mut frame = sample_frame();
            frame.strength_a = strength;
            let bytes = encode_strength_frame(&frame).unwrap();
            assert_eq!(bytes[2], strength);
        }
        for strength in (STRENGTH_MAX + 1)..=u8::MAX {
            let mut frame = sample_frame();
            frame.strength_a = strength;
            assert!(matches!(
                encode_strength_frame(&frame),
                Err(ProtoError::FieldOutOfRange {
                    field: "strength_a",
                    ..
                })
            ));
        }
    }

    #[test]
    fn strength_frame_roundtrip_over_generated_quads() {
        // Deterministic LCG so the sweep is reproducible.
        let mut seed: u32 = 0x2545_F491;
        let mut next = move |min: u8, max: u8| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let span = (max - min) as u32 + 1;
            min + ((seed >> 16) % span) as u8
        };

        for round in 0..100 {
            let frame = StrengthFrame {
                sequence_no: next(0, SEQUENCE_NO_MAX),
                method_a: ParsingMethod::from_bits(next(0, 3)),
                method_b: ParsingMethod::from_bits(next(0, 3)),
                strength_a: next(0, STRENGTH_MAX),
                strength_b: next(0, STRENGTH_MAX),
                pulse_a: PulseOperation::new(
                    [(); 4].map(|_| next(PULSE_FREQUENCY_MIN, PULSE_FREQUENCY_MAX)),
                    [(); 4].map(|_| next(0, PULSE_STRENGTH_MAX)),
                ),
                pulse_b: PulseOperation::new(
                    [(); 4].map(|_| next(PULSE_FREQUENCY_MIN, PULSE_FREQUENCY_MAX)),
                    [(); 4].map(|_| next(0, PULSE_STRENGTH_MAX)),
                ),
            };

            let bytes = encode_strength_frame(&frame)
                .unwrap_or_else(|err| panic!("round {round} failed to encode: {err}"));
            assert_eq!(decode_strength_frame(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn sequence_no_above_four_bits_rejected() {
        let mut frame = sample_frame();
        frame.sequence_no = 16;
        assert!(encode_strength_frame(&frame).is_err());
    }

    #[test]
    fn pulse_frequency_below_minimum_rejected() {
        let mut frame = sample_frame();
        frame.pulse_b.frequency[2] = 9;
        assert!(matches!(
            encode_strength_frame(&frame),
            Err(ProtoError::FieldOutOfRange { field: "pulse_b", .. })
        ));
    }

    #[test]
    fn pulse_strength_above_maximum_rejected() {
        let mut frame = sample_frame();
        frame.pulse_a.strength[0] = 101;
        assert!(encode_strength_frame(&frame).is_err());
    }

    #[test]
    fn limit_frame_roundtrip() {
        let frame = LimitFrame {
            limit_a: 180,
            limit_b: 200,
            freq_balance_a: 100,
            freq_balance_b: 110,
            strength_balance_a: 0,
            strength_balance_b: 255,
        };
        let bytes = encode_limit_frame(&frame).unwrap();
        assert_eq!(bytes.len(), LIMIT_FRAME_LEN);
        assert_eq!(bytes[0], LIMIT_FRAME_TAG);
        assert_eq!(decode_limit_frame(&bytes).unwrap(), frame);
    }

    #[test]
    fn limit_frame_rejects_out_of_range_limit() {
        let frame = LimitFrame {
            limit_a: 201,
            limit_b: 0,
            freq_balance_a: 100,
            freq_balance_b: 100,
            strength_balance_a: 100,
            strength_balance_b: 100,
        };
        assert!(matches!(
            encode_limit_frame(&frame),
            Err(ProtoError::FieldOutOfRange { field: "limit_a", .. })
        ));
    }

    #[test]
    fn status_frame_decodes_and_tolerates_trailing_bytes() {
        let status = decode_status_frame(&[0xB1, 7, 55, 60, 0xAA, 0xBB]).unwrap();
        assert_eq!(
            status,
            StatusFrame {
                sequence_no: 7,
                strength_a: 55,
                strength_b: 60,
            }
        );
    }

    #[test]
    fn status_frame_rejects_short_payload() {
        assert!(matches!(
            decode_status_frame(&[0xB1, 7, 55]),
            Err(ProtoError::Truncated { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn status_frame_rejects_wrong_tag() {
        assert!(matches!(
            decode_status_frame(&[0xB0, 7, 55, 60]),
            Err(ProtoError::UnexpectedTag {
                expected: 0xB1,
                actual: 0xB0,
            })
        ));
    }

    #[test]
    fn decode_strength_frame_rejects_wrong_length() {
        let bytes = encode_strength_frame(&sample_frame()).unwrap();
        assert!(decode_strength_frame(&bytes[..19]).is_err());
    }
}
