/// Errors that can occur while framing payloads or pulling them off a stream.
///
/// Malformed input is never an error: the stream decoder resynchronizes on
/// its own and only reports what it dropped through logs and counters.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the frame's length field or the configured limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before another complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
