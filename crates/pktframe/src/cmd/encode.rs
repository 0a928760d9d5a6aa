use std::fs;
use std::io::Read;

use pktframe_codec::{encode, FrameError};

use crate::cmd::{EncodeArgs, FramingArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{mode_name, print_wire};

pub fn run(args: EncodeArgs, framing: FramingArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    if payload.is_empty() {
        return Err(CliError::new(
            USAGE,
            "payload must not be empty (decoders reject zero-length frames)",
        ));
    }

    let max = framing.decoder_config().max_payload_size();
    if payload.len() > max {
        return Err(frame_error(
            "encode failed",
            FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            },
        ));
    }

    let mode = framing.checksum_mode();
    let frame = encode(&payload, mode).map_err(|err| frame_error("encode failed", err))?;
    tracing::debug!(
        payload = payload.len(),
        wire = frame.len(),
        mode = mode_name(mode),
        "payload framed"
    );

    print_wire(&frame, args.output);
    Ok(SUCCESS)
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }

    let mut payload = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut payload)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(payload)
}
