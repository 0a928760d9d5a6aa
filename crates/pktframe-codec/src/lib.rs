//! Checksummed framing for unreliable byte streams.
//!
//! Every payload is framed with:
//! - A 2-byte magic number (`0x5A 0xA5`) for stream synchronization
//! - A 4-byte big-endian payload length
//! - A 2-byte big-endian checksum of the length field
//! - The payload itself
//! - A 2-byte big-endian payload check (payload checksum, or the complement
//!   of the length checksum in light mode)
//!
//! The [`StreamDecoder`] accepts bytes in any chunking, skips garbage, and
//! recovers from corruption without losing the frames that follow it.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod checksum;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::PacketCodec;
pub use checksum::{crc16_arc, Checksum16, Crc16Arc};
pub use codec::{
    encode, encode_frame, encode_frame_with, ChecksumMode, DecoderConfig, FrameParts,
    DEFAULT_MAX_BUFFER_SIZE, FRAME_OVERHEAD, HEADER_SIZE, MAGIC, TRAILER_SIZE,
};
pub use decoder::{decode_all, DecoderStats, PayloadSink, Phase, Resync, StreamDecoder};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, ReaderConfig};
pub use writer::{FrameWriter, WriterConfig, DEFAULT_MAX_WRITE_PAYLOAD};
