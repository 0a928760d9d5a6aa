mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, FramingArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "pktframe",
    version,
    about = "Frame payloads and decode checksummed byte streams"
)]
struct Cli {
    /// Output format for decoded payloads.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    framing: FramingArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, cli.framing, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktframe_codec::{ChecksumMode, DEFAULT_MAX_BUFFER_SIZE};

    #[test]
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from(["pktframe", "encode", "--data", "hello"])
            .expect("encode args should parse");

        assert!(matches!(cli.command, Command::Encode(_)));
        assert_eq!(cli.framing.checksum_mode(), ChecksumMode::Payload);
        assert_eq!(cli.framing.max_buffer, DEFAULT_MAX_BUFFER_SIZE);
    }

    #[test]
    fn framing_flags_are_global() {
        let cli = Cli::try_parse_from([
            "pktframe",
            "decode",
            "--hex",
            "--no-checksum",
            "--max-buffer",
            "64",
        ])
        .expect("decode args should parse");

        let Command::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert!(args.hex);
        assert_eq!(args.chunk_size, 8192);
        let config = cli.framing.decoder_config();
        assert_eq!(config.checksum, ChecksumMode::Light);
        assert_eq!(config.max_buffer_size, 64);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "pktframe",
            "encode",
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_version_subcommand() {
        let cli = Cli::try_parse_from(["pktframe", "version", "--extended"])
            .expect("version args should parse");
        assert!(matches!(cli.command, Command::Version(args) if args.extended));
    }
}
