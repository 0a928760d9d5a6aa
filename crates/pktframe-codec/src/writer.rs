use std::io::{ErrorKind, Write};

use crate::codec::{ChecksumMode, FrameParts};
use crate::error::{FrameError, Result};

/// Default maximum payload a writer accepts: 1 MiB minus frame overhead, so
/// a peer decoder with default settings can always take it.
pub const DEFAULT_MAX_WRITE_PAYLOAD: usize =
    crate::codec::DEFAULT_MAX_BUFFER_SIZE as usize - crate::codec::FRAME_OVERHEAD;

/// Configuration for [`FrameWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Trailer mode for outgoing frames. Default: [`ChecksumMode::Payload`].
    pub checksum: ChecksumMode,
    /// Largest payload accepted by [`FrameWriter::send`].
    pub max_payload_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumMode::Payload,
            max_payload_size: DEFAULT_MAX_WRITE_PAYLOAD,
        }
    }
}

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    config: WriterConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WriterConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: WriterConfig) -> Self {
        Self { inner, config }
    }

    /// Frame and send a payload (blocking), then flush.
    ///
    /// Header, payload and trailer are written in turn; the payload is never
    /// copied.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let parts = FrameParts::new(payload, self.config.checksum)?;
        for part in [parts.header(), parts.payload(), parts.trailer()] {
            self.write_part(part)?;
        }

        self.flush()
    }

    fn write_part(&mut self, mut part: &[u8]) -> Result<()> {
        while !part.is_empty() {
            match self.inner.write(part) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => part = &part[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Switch the trailer mode for subsequent frames.
    pub fn set_checksum_mode(&mut self, mode: ChecksumMode) {
        self.config.checksum = mode;
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}
