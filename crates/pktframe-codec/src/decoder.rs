//! Incremental, self-resynchronizing stream decoder.
//!
//! Bytes may arrive in any chunking, mixed with garbage. The decoder keeps
//! the unresolved tail of the stream and hands every validated payload to a
//! [`PayloadSink`] before [`StreamDecoder::feed`] returns.
//!
//! Malformed input is never an error. It is resolved in one of two ways:
//!
//! - **narrow resync**: a zero or oversized length, or a failed length or
//!   payload check, drops only the two magic bytes of the offending frame and
//!   rescans what is already buffered, so a valid frame right behind a
//!   corrupted one is not lost;
//! - **full reset**: accepting a chunk would push the buffer past
//!   `max_buffer_size`, so everything buffered and the chunk itself are
//!   dropped.

use std::collections::VecDeque;
use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::checksum::{Checksum16, Crc16Arc};
use crate::codec::{
    payload_check, ChecksumMode, DecoderConfig, FRAME_OVERHEAD, HEADER_SIZE, LENGTH_CHECK_RANGE,
    LENGTH_RANGE, MAGIC,
};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Receives validated payloads.
///
/// The slice is borrowed from the decoder's buffer and is only valid for the
/// duration of the call. Sinks run inline on the caller's stack and should
/// hand the payload off rather than process it in place.
pub trait PayloadSink {
    /// Called once per validated frame, in stream order.
    fn on_payload(&mut self, payload: &[u8]);
}

impl<F: FnMut(&[u8])> PayloadSink for F {
    fn on_payload(&mut self, payload: &[u8]) {
        self(payload)
    }
}

/// Queues owned copies of every payload.
impl PayloadSink for VecDeque<Bytes> {
    fn on_payload(&mut self, payload: &[u8]) {
        self.push_back(Bytes::copy_from_slice(payload));
    }
}

/// Where the decoder is in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Looking for the magic bytes.
    SeekingHeader,
    /// Magic confirmed at the head of the buffer; length not yet validated.
    HaveHeader,
    /// Length validated; waiting for payload and trailer.
    HaveLength { length: u32 },
}

/// Why buffered bytes were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// The length field was zero.
    ZeroLength,
    /// The length field does not fit `max_buffer_size`.
    OversizedLength,
    /// The length check did not match the length field.
    LengthCheckMismatch,
    /// The payload check did not match.
    PayloadCheckMismatch,
    /// A chunk would have pushed the buffer past `max_buffer_size`.
    Overflow,
}

impl Resync {
    /// True when the whole buffer was discarded rather than just the header.
    pub fn is_full_reset(self) -> bool {
        matches!(self, Self::Overflow)
    }

    /// Short label used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZeroLength => "zero-length",
            Self::OversizedLength => "oversized-length",
            Self::LengthCheckMismatch => "length-check-mismatch",
            Self::PayloadCheckMismatch => "payload-check-mismatch",
            Self::Overflow => "overflow",
        }
    }
}

impl fmt::Display for Resync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters describing what a decoder has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Payloads delivered to the sink.
    pub frames: u64,
    /// Total payload bytes delivered.
    pub payload_bytes: u64,
    /// Bytes dropped without being delivered (garbage, bad headers, overflow).
    pub discarded_bytes: u64,
    /// Narrow resyncs performed.
    pub narrow_resyncs: u64,
    /// Full resets performed because of overflow.
    pub overflow_resets: u64,
}

#[derive(Debug, Default)]
struct DecoderState {
    buffer: BytesMut,
    header_found: bool,
    pending_length: Option<u32>,
}

impl DecoderState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    fn phase(&self) -> Phase {
        match (self.header_found, self.pending_length) {
            (false, _) => Phase::SeekingHeader,
            (true, None) => Phase::HaveHeader,
            (true, Some(length)) => Phase::HaveLength { length },
        }
    }

    /// Drop `pos` bytes from the front and start looking for a header again.
    fn restart_at(&mut self, pos: usize) {
        self.buffer.advance(pos);
        self.header_found = false;
        self.pending_length = None;
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.header_found = false;
        self.pending_length = None;
    }
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(MAGIC.len()).position(|w| w == MAGIC)
}

/// Bytes at the tail of `data` worth keeping when no magic was found: a lone
/// first magic byte may be completed by the next chunk.
fn retained_tail(data: &[u8]) -> usize {
    usize::from(data.last() == Some(&MAGIC[0]))
}

/// Stateful frame parser for one logical stream.
///
/// One decoder per stream; `feed` takes `&mut self`, so concurrent use has to
/// be serialized by the owner.
pub struct StreamDecoder<S, C = Crc16Arc> {
    sink: S,
    checksum: C,
    config: DecoderConfig,
    state: DecoderState,
    stats: DecoderStats,
}

impl<S: PayloadSink> StreamDecoder<S> {
    /// Create a decoder with default configuration and the CRC-16/ARC checksum.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, DecoderConfig::default())
    }

    /// Create a decoder with explicit configuration and the CRC-16/ARC checksum.
    pub fn with_config(sink: S, config: DecoderConfig) -> Self {
        Self::with_checksum(sink, config, Crc16Arc)
    }
}

impl<S: PayloadSink, C: Checksum16> StreamDecoder<S, C> {
    /// Create a decoder with an explicit checksum provider.
    pub fn with_checksum(sink: S, config: DecoderConfig, checksum: C) -> Self {
        let capacity = INITIAL_BUFFER_CAPACITY.min(config.max_buffer_size as usize);
        Self {
            sink,
            checksum,
            config,
            state: DecoderState::with_capacity(capacity),
            stats: DecoderStats::default(),
        }
    }

    /// Consume a chunk of the stream.
    ///
    /// Calls the sink once for every frame completed by this chunk, in order.
    /// Never fails: malformed input is dropped and scanning resumes.
    pub fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        trace!(len = chunk.len(), buffered = self.state.buffer.len(), "feed");

        let chunk = self.skip_preamble(chunk);
        let needed = self.state.buffer.len() + chunk.len();
        if needed > self.config.max_buffer_size as usize {
            warn!(
                needed,
                max = self.config.max_buffer_size,
                reason = %Resync::Overflow,
                "buffer limit exceeded, discarding all buffered bytes"
            );
            self.note_discarded(needed);
            self.note_resync(Resync::Overflow);
            self.state.reset();
            return;
        }

        self.state.buffer.extend_from_slice(chunk);
        self.drain();
    }

    /// Consume `data` in slices that always fit the room left in the buffer.
    ///
    /// For callers that pick their own read size: complete frames are then
    /// resolved one slice at a time instead of being lost to an overflow
    /// reset. A single frame that cannot fit still triggers one.
    pub fn feed_bounded(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = (self.config.max_buffer_size as usize)
                .saturating_sub(self.state.buffer.len())
                .max(1);
            let (head, rest) = data.split_at(room.min(data.len()));
            self.feed(head);
            data = rest;
        }
    }

    /// Drop leading garbage from `chunk` while no header is buffered, so
    /// noise between frames never counts against the buffer limit.
    fn skip_preamble<'c>(&mut self, chunk: &'c [u8]) -> &'c [u8] {
        if self.state.header_found || self.state.buffer.len() > 1 {
            return chunk;
        }
        if self.state.buffer.first() == Some(&MAGIC[0]) && chunk[0] == MAGIC[1] {
            return chunk;
        }

        let held = self.state.buffer.len();
        self.state.buffer.clear();
        let start = match find_magic(chunk) {
            Some(pos) => pos,
            None => chunk.len() - retained_tail(chunk),
        };
        self.note_discarded(held + start);
        &chunk[start..]
    }

    /// Resolve as many frames as the buffer holds.
    fn drain(&mut self) {
        loop {
            let progressed = match self.state.phase() {
                Phase::SeekingHeader => self.seek_header(),
                Phase::HaveHeader => self.read_length(),
                Phase::HaveLength { length } => self.complete_frame(length),
            };
            if !progressed {
                return;
            }
        }
    }

    fn seek_header(&mut self) -> bool {
        match find_magic(&self.state.buffer) {
            Some(pos) => {
                self.state.buffer.advance(pos);
                self.note_discarded(pos);
                self.state.header_found = true;
                true
            }
            None => {
                let drop = self.state.buffer.len() - retained_tail(&self.state.buffer);
                self.state.buffer.advance(drop);
                self.note_discarded(drop);
                false
            }
        }
    }

    fn read_length(&mut self) -> bool {
        let buf = &self.state.buffer;
        if buf.len() < HEADER_SIZE {
            return false;
        }

        let mut raw = [0u8; 4];
        raw.copy_from_slice(&buf[LENGTH_RANGE]);
        let length = u32::from_be_bytes(raw);
        let length_check = read_u16(buf, LENGTH_CHECK_RANGE.start);

        if length == 0 {
            self.narrow_resync(Resync::ZeroLength);
            return true;
        }
        if u64::from(length) + FRAME_OVERHEAD as u64 > u64::from(self.config.max_buffer_size) {
            debug!(
                length,
                max = self.config.max_buffer_size,
                "frame length exceeds buffer limit"
            );
            self.narrow_resync(Resync::OversizedLength);
            return true;
        }

        let expected = self.checksum.checksum16(&raw);
        if expected != length_check {
            debug!(expected, actual = length_check, "length check mismatch");
            self.narrow_resync(Resync::LengthCheckMismatch);
            return true;
        }

        trace!(length, "frame length accepted");
        self.state.pending_length = Some(length);
        true
    }

    fn complete_frame(&mut self, length: u32) -> bool {
        let payload_end = HEADER_SIZE + length as usize;
        let frame_len = payload_end + (FRAME_OVERHEAD - HEADER_SIZE);
        let buf = &self.state.buffer;
        if buf.len() < frame_len {
            return false;
        }

        let length_check = read_u16(buf, LENGTH_CHECK_RANGE.start);
        let actual = read_u16(buf, payload_end);
        let payload = &buf[HEADER_SIZE..payload_end];
        let expected = payload_check(&self.checksum, self.config.checksum, length_check, payload);

        if expected != actual {
            debug!(length, expected, actual, "payload check mismatch");
            self.narrow_resync(Resync::PayloadCheckMismatch);
            return true;
        }

        debug!(length, "frame decoded");
        self.sink.on_payload(payload);
        self.stats.frames += 1;
        self.stats.payload_bytes += u64::from(length);
        self.state.restart_at(frame_len);
        true
    }

    fn narrow_resync(&mut self, reason: Resync) {
        debug!(reason = %reason, buffered = self.state.buffer.len(), "resync past header");
        self.note_resync(reason);
        self.note_discarded(MAGIC.len());
        self.state.restart_at(MAGIC.len());
    }

    fn note_resync(&mut self, reason: Resync) {
        if reason.is_full_reset() {
            self.stats.overflow_resets += 1;
        } else {
            self.stats.narrow_resyncs += 1;
        }
    }

    fn note_discarded(&mut self, count: usize) {
        self.stats.discarded_bytes += count as u64;
    }

    /// Drop everything buffered and start looking for a header again.
    ///
    /// Configuration and statistics are kept.
    pub fn clear_buffer(&mut self) {
        self.state.reset();
    }

    /// Switch trailer mode. Takes effect for the next frame checked.
    pub fn set_checksum_mode(&mut self, mode: ChecksumMode) {
        self.config.checksum = mode;
    }

    /// Change the buffer ceiling. Clears the buffer.
    pub fn set_max_buffer_size(&mut self, max_buffer_size: u32) {
        self.config.max_buffer_size = max_buffer_size;
        self.clear_buffer();
    }

    /// Change the buffer ceiling so a payload of `max_payload_size` still fits.
    /// Clears the buffer.
    pub fn set_max_payload_size(&mut self, max_payload_size: u32) {
        self.config = self.config.with_max_payload_size(max_payload_size);
        self.clear_buffer();
    }
}

impl<S, C> StreamDecoder<S, C> {
    /// Current configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Current position in the frame state machine.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Number of bytes currently held, unresolved.
    pub fn buffered_len(&self) -> usize {
        self.state.buffer.len()
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the decoder and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S, C> fmt::Debug for StreamDecoder<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("config", &self.config)
            .field("phase", &self.state.phase())
            .field("buffered", &self.state.buffer.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Decode every complete frame in `data`, fed as a single chunk.
pub fn decode_all(data: &[u8], config: DecoderConfig) -> Vec<Bytes> {
    let mut decoder = StreamDecoder::with_config(VecDeque::<Bytes>::new(), config);
    decoder.feed(data);
    decoder.into_sink().into()
}
