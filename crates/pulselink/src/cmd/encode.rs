use pulselink_proto::{encode_strength_frame, PulseOperation, StrengthFrame};

use crate::cmd::EncodeArgs;
use crate::exit::{proto_error, CliResult, SUCCESS};
use crate::output::{print_decoded, to_hex, DecodedFrame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let pulse = PulseOperation::new([args.frequency; 4], [args.pulse_strength; 4]);
    let frame = StrengthFrame {
        sequence_no: args.sequence,
        method_a: args.method_a.into(),
        method_b: args.method_b.into(),
        strength_a: args.strength_a,
        strength_b: args.strength_b,
        pulse_a: pulse,
        pulse_b: pulse,
    };

    let bytes = encode_strength_frame(&frame).map_err(|err| proto_error("encode failed", err))?;
    print_decoded(&DecodedFrame::Strength(frame), &to_hex(&bytes), format);
    Ok(SUCCESS)
}
