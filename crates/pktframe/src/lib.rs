//! Checksummed framing for serial, socket and radio byte streams.
//!
//! pktframe turns an unreliable, arbitrarily chunked byte stream into
//! discrete, integrity-checked payloads, and frames payloads for sending.
//!
//! # Crate Structure
//!
//! - [`codec`]: frame encoder, incremental stream decoder, blocking reader
//!   and writer, and the `tokio_util` codec (behind the `async` feature)

/// Re-export codec types.
pub mod codec {
    pub use pktframe_codec::*;
}

pub use pktframe_codec::{encode, ChecksumMode, DecoderConfig, StreamDecoder};
