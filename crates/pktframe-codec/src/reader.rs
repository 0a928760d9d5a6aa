use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::codec::{ChecksumMode, DecoderConfig};
use crate::decoder::{DecoderStats, StreamDecoder};
use crate::error::{FrameError, Result};

const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for [`FrameReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Decoder settings.
    pub decoder: DecoderConfig,
    /// Bytes requested from the stream per `read` call. Default: 8 KiB.
    pub read_chunk_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// Reads validated payloads from any `Read` stream.
///
/// Garbage and corrupted frames are skipped by the decoder; callers only
/// ever see payloads that passed every check.
pub struct FrameReader<T> {
    inner: T,
    decoder: StreamDecoder<VecDeque<Bytes>>,
    scratch: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: ReaderConfig) -> Self {
        Self {
            inner,
            decoder: StreamDecoder::with_config(VecDeque::new(), config.decoder),
            scratch: vec![0u8; config.read_chunk_size.max(1)],
        }
    }

    /// Read the next validated payload (blocking).
    ///
    /// Payloads already decoded from an earlier read are returned first.
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = self.decoder.sink_mut().pop_front() {
                return Ok(payload);
            }

            let read = match self.inner.read(&mut self.scratch) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.feed_bounded(&self.scratch[..read]);
        }
    }

    /// Payloads decoded but not yet returned by [`read_frame`](Self::read_frame).
    pub fn pending(&self) -> usize {
        self.decoder.sink().len()
    }

    /// Bytes read from the stream but not yet resolved into a payload.
    pub fn buffered_len(&self) -> usize {
        self.decoder.buffered_len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Buffered bytes and pending payloads are dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Switch the trailer mode expected on subsequent frames.
    pub fn set_checksum_mode(&mut self, mode: ChecksumMode) {
        self.decoder.set_checksum_mode(mode);
    }

    /// Update the decoder buffer ceiling. Drops any partially received frame.
    pub fn set_max_buffer_size(&mut self, max_buffer_size: u32) {
        self.decoder.set_max_buffer_size(max_buffer_size);
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        self.decoder.config()
    }

    /// Decoder counters.
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, FRAME_OVERHEAD, MAGIC};

    fn wire_of(payloads: &[&[u8]]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, ChecksumMode::Payload, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire_of(&[b"hello"])));
        let payload = reader.read_frame().unwrap();
        assert_eq!(payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire_of(&[b"one", b"two", b"three"])));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert_eq!(reader.pending(), 2);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"three");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn read_frame_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire_of(&[&payload])));
        assert_eq!(reader.read_frame().unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire_of(&[b"slow"]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = wire_of(&[b"only-part-of-this"]);
        partial.truncate(12);

        let mut reader = FrameReader::new(Cursor::new(partial));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn garbage_in_stream_is_skipped() {
        let mut bytes = vec![0x00, 0x01, 0x5A, 0x00, 0xA5];
        bytes.extend_from_slice(&wire_of(&[b"after-noise"]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"after-noise");
        assert_eq!(reader.stats().discarded_bytes, 5);
    }

    #[test]
    fn oversized_frame_in_stream_is_skipped() {
        let mut wire = BytesMut::new();
        wire.put_slice(&MAGIC);
        wire.put_u32(1024);
        wire.put_u16(crate::checksum::crc16_arc(&1024u32.to_be_bytes()));
        wire.put_slice(&wire_of(&[b"fits"]));

        let cfg = ReaderConfig {
            decoder: DecoderConfig::default().with_max_payload_size(16),
            ..ReaderConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"fits");
        assert_eq!(reader.stats().narrow_resyncs, 1);
        assert_eq!(reader.config().max_buffer_size as usize, 16 + FRAME_OVERHEAD);
    }

    #[test]
    fn large_reads_do_not_overflow_small_buffer() {
        let cfg = ReaderConfig {
            decoder: DecoderConfig::default().with_max_payload_size(16),
            ..ReaderConfig::default()
        };
        let wire = wire_of(&[b"alpha", b"bravo", b"charlie"]);
        assert!(wire.len() > cfg.decoder.max_buffer_size as usize);

        let mut reader = FrameReader::with_config(Cursor::new(wire), cfg);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"alpha");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"bravo");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"charlie");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
        assert_eq!(reader.stats().overflow_resets, 0);
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn light_mode_reader() {
        let mut wire = BytesMut::new();
        encode_frame(b"light", ChecksumMode::Light, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        reader.set_checksum_mode(ChecksumMode::Light);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"light");
    }

    #[test]
    fn small_read_chunks() {
        let cfg = ReaderConfig {
            read_chunk_size: 3,
            ..ReaderConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire_of(&[b"abc", b"defg"])), cfg);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"abc");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"defg");
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(b"ping").unwrap();
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"ping");
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let reader = Arc::new(Mutex::new(FrameReader::new(right)));

        let reader_thread = {
            let reader = Arc::clone(&reader);
            std::thread::spawn(move || {
                for expected in 0..64u16 {
                    let payload = reader.lock().unwrap().read_frame().unwrap();
                    assert_eq!(payload.as_ref(), format!("msg-{expected}").as_bytes());
                }
            })
        };

        for i in 0..64u16 {
            writer.send(format!("msg-{i}").as_bytes()).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.set_max_buffer_size(128);
        assert_eq!(reader.config().max_buffer_size, 128);
        let _inner = reader.into_inner();
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = FailOnceThenData {
            kind: ErrorKind::WouldBlock,
            failed: false,
            data: Cursor::new(wire_of(&[b"ok"])),
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = FailOnceThenData {
            kind: ErrorKind::Interrupted,
            failed: false,
            data: Cursor::new(wire_of(&[b"ok"])),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"ok");
    }

    struct FailOnceThenData {
        kind: ErrorKind,
        failed: bool,
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailOnceThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            self.data.read(buf)
        }
    }
}
