//! `tokio_util::codec` adapter over the stream decoder.
//!
//! Use with `FramedRead` / `FramedWrite` to carry payloads over any async
//! byte stream.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, DecoderConfig};
use crate::decoder::{DecoderStats, StreamDecoder};
use crate::error::{FrameError, Result};

/// Frames outgoing payloads and yields validated incoming payloads.
pub struct PacketCodec {
    decoder: StreamDecoder<VecDeque<Bytes>>,
}

impl PacketCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a codec with explicit configuration.
    ///
    /// The checksum mode applies to both directions, and outgoing payloads
    /// are held to the same size limit incoming ones are.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            decoder: StreamDecoder::with_config(VecDeque::new(), config),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &DecoderConfig {
        self.decoder.config()
    }

    /// Decoder counters.
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        // The decoder keeps its own buffer, so everything offered is taken.
        if !src.is_empty() {
            let chunk = src.split();
            self.decoder.feed_bounded(&chunk);
        }
        Ok(self.decoder.sink_mut().pop_front())
    }
}

impl Encoder<Bytes> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        let max = self.decoder.config().max_payload_size();
        if item.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max,
            });
        }
        encode_frame(&item, self.decoder.config().checksum, dst)
    }
}
