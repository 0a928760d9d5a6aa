use clap::{Args, Subcommand};
use std::path::PathBuf;

use pktframe_codec::{ChecksumMode, DecoderConfig, DEFAULT_MAX_BUFFER_SIZE};

use crate::exit::CliResult;
use crate::output::{OutputFormat, WireOutput};

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame a payload and print the wire bytes.
    Encode(EncodeArgs),
    /// Decode a byte stream and print every valid payload.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, framing: FramingArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, framing),
        Command::Decode(args) => decode::run(args, framing, format),
        Command::Version(args) => version::run(args),
    }
}

/// Wire settings shared by every subcommand. Both ends of a link must agree.
#[derive(Args, Debug, Clone, Copy)]
pub struct FramingArgs {
    /// Checksum-light mode: the trailer is the complement of the length
    /// check, so payload bytes are not verified.
    #[arg(long, global = true, env = "PKTFRAME_NO_CHECKSUM")]
    pub no_checksum: bool,
    /// Maximum bytes the decoder may hold unresolved.
    #[arg(
        long,
        value_name = "BYTES",
        global = true,
        env = "PKTFRAME_MAX_BUFFER",
        default_value_t = DEFAULT_MAX_BUFFER_SIZE
    )]
    pub max_buffer: u32,
}

impl FramingArgs {
    pub fn checksum_mode(&self) -> ChecksumMode {
        ChecksumMode::from_flag(!self.no_checksum)
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            checksum: self.checksum_mode(),
            max_buffer_size: self.max_buffer,
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// JSON payload (validated before framing).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Read payload from file. With no payload option, stdin is read.
    #[arg(long, conflicts_with_all = ["data", "json"])]
    pub file: Option<PathBuf>,
    /// How to print the framed bytes.
    #[arg(long, value_enum, default_value_t = WireOutput::Hex)]
    pub output: WireOutput,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read the stream from a file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Treat input as hex text (whitespace ignored).
    #[arg(long)]
    pub hex: bool,
    /// Bytes handed to the decoder per read.
    #[arg(long, value_name = "BYTES", default_value_t = 8192)]
    pub chunk_size: usize,
    /// Exit after printing N payloads.
    #[arg(long)]
    pub count: Option<u64>,
    /// Exit with a data error if any bytes were discarded or left unresolved.
    #[arg(long)]
    pub strict: bool,
    /// Print decoder counters as JSON to stderr when done.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
