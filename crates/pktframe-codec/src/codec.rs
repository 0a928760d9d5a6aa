use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::{Checksum16, Crc16Arc};
use crate::error::{FrameError, Result};

/// Magic bytes marking the start of every frame.
pub const MAGIC: [u8; 2] = [0x5A, 0xA5];

/// Frame header: magic (2) + length (4) + length check (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Frame trailer: payload check (2).
pub const TRAILER_SIZE: usize = 2;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Default ceiling on bytes a decoder may hold unresolved: 1 MiB.
pub const DEFAULT_MAX_BUFFER_SIZE: u32 = 1024 * 1024;

pub(crate) const LENGTH_RANGE: std::ops::Range<usize> = 2..6;
pub(crate) const LENGTH_CHECK_RANGE: std::ops::Range<usize> = 6..8;

/// How the trailing payload check is computed.
///
/// The two modes are distinct wire variants. Both ends of a link must use the
/// same one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChecksumMode {
    /// PayloadCheck is the checksum of the payload bytes.
    #[default]
    Payload,
    /// PayloadCheck is the bitwise complement of LengthCheck.
    ///
    /// Only the length field is protected. The trailer is a structural
    /// marker: a corrupted payload with an intact header and trailer is
    /// accepted as valid.
    Light,
}

impl ChecksumMode {
    /// Map a `use_checksum` flag onto a mode.
    pub fn from_flag(use_checksum: bool) -> Self {
        if use_checksum {
            Self::Payload
        } else {
            Self::Light
        }
    }

    /// Whether the payload bytes are covered by the trailer.
    pub fn covers_payload(self) -> bool {
        matches!(self, Self::Payload)
    }
}

/// Expected trailer value for a payload under the given mode.
pub(crate) fn payload_check<C: Checksum16 + ?Sized>(
    checksum: &C,
    mode: ChecksumMode,
    length_check: u16,
    payload: &[u8],
) -> u16 {
    match mode {
        ChecksumMode::Payload => checksum.checksum16(payload),
        ChecksumMode::Light => !length_check,
    }
}

fn payload_len_field(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

/// A frame split into its encoded header, borrowed payload and encoded trailer.
///
/// Lets writers emit a frame without first copying the payload into a
/// contiguous buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameParts<'a> {
    header: [u8; HEADER_SIZE],
    payload: &'a [u8],
    trailer: [u8; TRAILER_SIZE],
}

impl<'a> FrameParts<'a> {
    /// Frame a payload with the default CRC-16/ARC checksum.
    pub fn new(payload: &'a [u8], mode: ChecksumMode) -> Result<Self> {
        Self::with_checksum(payload, mode, &Crc16Arc)
    }

    /// Frame a payload with an explicit checksum provider.
    pub fn with_checksum<C: Checksum16 + ?Sized>(
        payload: &'a [u8],
        mode: ChecksumMode,
        checksum: &C,
    ) -> Result<Self> {
        let length = payload_len_field(payload.len())?.to_be_bytes();
        let length_check = checksum.checksum16(&length);

        let mut header = [0u8; HEADER_SIZE];
        header[..2].copy_from_slice(&MAGIC);
        header[LENGTH_RANGE].copy_from_slice(&length);
        header[LENGTH_CHECK_RANGE].copy_from_slice(&length_check.to_be_bytes());

        let trailer = payload_check(checksum, mode, length_check, payload).to_be_bytes();

        Ok(Self {
            header,
            payload,
            trailer,
        })
    }

    /// Magic, length and length check.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// The payload, as borrowed.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// The payload check.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Append the whole frame to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_slice(&self.header);
        dst.put_slice(self.payload);
        dst.put_slice(&self.trailer);
    }
}

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format (all integers big-endian):
/// ```text
/// ┌────────────┬────────────┬─────────────┬──────────────┬──────────────┐
/// │ Magic (2B) │ Length     │ LengthCheck │ Payload      │ PayloadCheck │
/// │ 0x5A 0xA5  │ (4B BE)    │ (2B BE)     │ (Length B)   │ (2B BE)      │
/// └────────────┴────────────┴─────────────┴──────────────┴──────────────┘
/// ```
///
/// LengthCheck is the checksum of the four raw Length bytes. PayloadCheck is
/// the checksum of the payload, or `!LengthCheck` in [`ChecksumMode::Light`].
pub fn encode_frame(payload: &[u8], mode: ChecksumMode, dst: &mut BytesMut) -> Result<()> {
    encode_frame_with(payload, mode, &Crc16Arc, dst)
}

/// [`encode_frame`] with an explicit checksum provider.
pub fn encode_frame_with<C: Checksum16 + ?Sized>(
    payload: &[u8],
    mode: ChecksumMode,
    checksum: &C,
    dst: &mut BytesMut,
) -> Result<()> {
    FrameParts::with_checksum(payload, mode, checksum)?.write_to(dst);
    Ok(())
}

/// Encode a payload into a fresh, frozen buffer.
pub fn encode(payload: &[u8], mode: ChecksumMode) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    encode_frame(payload, mode, &mut dst)?;
    Ok(dst.freeze())
}

/// Configuration for the stream decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Trailer mode expected on incoming frames. Default: [`ChecksumMode::Payload`].
    pub checksum: ChecksumMode,
    /// Hard ceiling on buffered, unresolved bytes. Default: 1 MiB.
    ///
    /// A frame is accepted only if `length + FRAME_OVERHEAD` fits.
    pub max_buffer_size: u32,
}

impl DecoderConfig {
    /// Size the buffer so a payload of exactly `max_payload_size` bytes still fits.
    pub fn with_max_payload_size(mut self, max_payload_size: u32) -> Self {
        self.max_buffer_size = max_payload_size.saturating_add(FRAME_OVERHEAD as u32);
        self
    }

    /// Use the given trailer mode.
    pub fn with_checksum(mut self, checksum: ChecksumMode) -> Self {
        self.checksum = checksum;
        self
    }

    /// Largest payload a decoder with this configuration accepts.
    pub fn max_payload_size(&self) -> usize {
        (self.max_buffer_size as usize).saturating_sub(FRAME_OVERHEAD)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumMode::Payload,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::crc16_arc;

    #[test]
    fn test_encoded_size() {
        let frame = encode(b"hello, pktframe!", ChecksumMode::Payload).unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD + 16);
    }

    #[test]
    fn test_hello_world_light_vector() {
        let frame = encode(b"hello world", ChecksumMode::Light).unwrap();
        let expected: &[u8] = &[
            0x5A, 0xA5, 0x00, 0x00, 0x00, 0x0B, 0xC7, 0x41, b'h', b'e', b'l', b'l', b'o', b' ',
            b'w', b'o', b'r', b'l', b'd', 0x38, 0xBE,
        ];
        assert_eq!(frame.as_ref(), expected);
    }

    #[test]
    fn test_payload_mode_trailer_is_payload_crc() {
        let frame = encode(b"hello world", ChecksumMode::Payload).unwrap();
        let trailer = u16::from_be_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        assert_eq!(trailer, crc16_arc(b"hello world"));
        assert_eq!(&frame[..HEADER_SIZE], &[0x5A, 0xA5, 0, 0, 0, 0x0B, 0xC7, 0x41]);
    }

    #[test]
    fn test_single_byte_light_vector() {
        let frame = encode(&[0xAA], ChecksumMode::Light).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0x5A, 0xA5, 0x00, 0x00, 0x00, 0x01, 0xC0, 0xC1, 0xAA, 0x3F, 0x3E]
        );
    }

    #[test]
    fn test_encode_frame_appends() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        encode_frame(b"abc", ChecksumMode::Payload, &mut buf).unwrap();
        assert_eq!(&buf[..6], b"prefix");
        assert_eq!(&buf[6..8], &MAGIC);
        assert_eq!(buf.len(), 6 + FRAME_OVERHEAD + 3);
    }

    #[test]
    fn test_parts_match_contiguous_encoding() {
        let parts = FrameParts::new(b"split", ChecksumMode::Payload).unwrap();
        let mut joined = Vec::new();
        joined.extend_from_slice(parts.header());
        joined.extend_from_slice(parts.payload());
        joined.extend_from_slice(parts.trailer());

        let frame = encode(b"split", ChecksumMode::Payload).unwrap();
        assert_eq!(joined, frame.as_ref());
        assert_eq!(parts.wire_size(), frame.len());
    }

    #[test]
    fn test_custom_checksum_provider() {
        fn constant(_: &[u8]) -> u16 {
            0x1234
        }
        let provider: fn(&[u8]) -> u16 = constant;

        let mut buf = BytesMut::new();
        encode_frame_with(b"x", ChecksumMode::Payload, &provider, &mut buf).unwrap();
        assert_eq!(&buf[6..8], &[0x12, 0x34]);
        assert_eq!(&buf[9..11], &[0x12, 0x34]);

        buf.clear();
        encode_frame_with(b"x", ChecksumMode::Light, &provider, &mut buf).unwrap();
        assert_eq!(&buf[9..11], &[0xED, 0xCB]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_length_field_overflow_rejected() {
        let err = payload_len_field(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert_eq!(payload_len_field(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[test]
    fn test_checksum_mode_from_flag() {
        assert_eq!(ChecksumMode::from_flag(true), ChecksumMode::Payload);
        assert_eq!(ChecksumMode::from_flag(false), ChecksumMode::Light);
        assert!(!ChecksumMode::Light.covers_payload());
    }

    #[test]
    fn test_config_max_payload_size() {
        let cfg = DecoderConfig::default().with_max_payload_size(1);
        assert_eq!(cfg.max_buffer_size, 11);
        assert_eq!(cfg.max_payload_size(), 1);
        assert_eq!(
            DecoderConfig::default().max_payload_size(),
            DEFAULT_MAX_BUFFER_SIZE as usize - FRAME_OVERHEAD
        );
    }
}
