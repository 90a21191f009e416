/// Errors that can occur while encoding, decoding or moving records.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The line is not a valid telemetry JSON object.
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    /// A percentage field is outside `0..=100`.
    #[error("field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u8 },

    /// The line contains nothing but whitespace.
    #[error("empty record")]
    Empty,

    /// No newline was seen within the configured maximum record size.
    #[error("record too large ({size} bytes without newline, max {max})")]
    RecordTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing records.
    #[error("record I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed (EOF on read, zero-length write).
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors confined to one line; the stream itself is still usable.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::Json(_) | FrameError::OutOfRange { .. } | FrameError::Empty
        )
    }

    /// True when a read or write gave up because its timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
