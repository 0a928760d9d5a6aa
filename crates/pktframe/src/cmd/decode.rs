use std::fs::File;
use std::io::{Cursor, Read};

use pktframe_codec::{FrameError, FrameReader, ReaderConfig};

use crate::cmd::{DecodeArgs, FramingArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_payload, stats_json, OutputFormat};

pub fn run(args: DecodeArgs, framing: FramingArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be greater than zero"));
    }

    let input = open_input(&args)?;
    let mode = framing.checksum_mode();
    let config = ReaderConfig {
        decoder: framing.decoder_config(),
        read_chunk_size: args.chunk_size,
    };
    let mut reader = FrameReader::with_config(input, config);

    let mut printed = 0u64;
    while args.count.map_or(true, |limit| printed < limit) {
        match reader.read_frame() {
            Ok(payload) => {
                printed += 1;
                print_payload(printed, &payload, mode, format);
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("read failed", err)),
        }
    }

    let stats = reader.stats();
    let unresolved = reader.buffered_len();
    if unresolved > 0 {
        tracing::warn!(bytes = unresolved, "stream ended inside a frame");
    }
    tracing::info!(
        frames = stats.frames,
        discarded_bytes = stats.discarded_bytes,
        narrow_resyncs = stats.narrow_resyncs,
        overflow_resets = stats.overflow_resets,
        "decode finished"
    );
    if args.stats {
        eprintln!("{}", stats_json(&stats));
    }

    if args.strict && (stats.discarded_bytes > 0 || unresolved > 0) {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "stream was not clean: {} bytes discarded, {} bytes unresolved",
                stats.discarded_bytes, unresolved
            ),
        ));
    }

    Ok(SUCCESS)
}

fn open_input(args: &DecodeArgs) -> CliResult<Box<dyn Read>> {
    let raw: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
        None => Box::new(std::io::stdin().lock()),
    };

    if !args.hex {
        return Ok(raw);
    }
    Ok(Box::new(Cursor::new(read_hex(raw)?)))
}

fn read_hex(mut input: impl Read) -> CliResult<Vec<u8>> {
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .map_err(|err| io_error("failed reading hex input", err))?;
    parse_hex(&text)
}

fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))
}
