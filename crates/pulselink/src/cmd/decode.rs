use pulselink_proto::{
    decode_limit_frame, decode_status_frame, decode_strength_frame, LIMIT_FRAME_TAG,
    STATUS_FRAME_TAG, STRENGTH_FRAME_TAG,
};

use crate::cmd::DecodeArgs;
use crate::exit::{proto_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{from_hex, print_decoded, to_hex, DecodedFrame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = from_hex(&args.hex)
        .ok_or_else(|| CliError::new(USAGE, "input is not valid hex"))?;
    let frame = decode_bytes(&bytes)?;
    print_decoded(&frame, &to_hex(&bytes), format);
    Ok(SUCCESS)
}

fn decode_bytes(bytes: &[u8]) -> CliResult<DecodedFrame> {
    match bytes.first() {
        Some(&STRENGTH_FRAME_TAG) => decode_strength_frame(bytes)
            .map(DecodedFrame::Strength)
            .map_err(|err| proto_error("strength frame", err)),
        Some(&LIMIT_FRAME_TAG) => decode_limit_frame(bytes)
            .map(DecodedFrame::Limit)
            .map_err(|err| proto_error("limit frame", err)),
        Some(&STATUS_FRAME_TAG) => decode_status_frame(bytes)
            .map(DecodedFrame::Status)
            .map_err(|err| proto_error("status frame", err)),
        Some(&tag) => Err(CliError::new(
            DATA_INVALID,
            format!("unknown frame tag 0x{tag:02X}"),
        )),
        None => Err(CliError::new(USAGE, "input is empty")),
    }
}
