use thiserror::Error;

/// Journal failures.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Underlying file I/O failed.
    #[error("journal I/O: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not start with a header this build accepts.
    #[error("bad journal header: {0}")]
    InvalidHeader(String),
    /// A frame header is malformed.
    #[error("bad frame at byte {offset}: {reason}")]
    InvalidFrame {
        /// Offset of the frame header.
        offset: u64,
        /// What is wrong with it.
        reason: String,
    },
    /// The file ends part-way through a frame (strict reads only).
    #[error("frame at byte {offset} is cut short by end of file")]
    TruncatedFrame {
        /// Offset of the incomplete frame.
        offset: u64,
    },
    /// A payload is larger than one frame may carry.
    #[error("payload of {size} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Frame limit.
        max: u32,
    },
    /// An earlier failed frame could not be removed; the writer refuses
    /// further appends.
    #[error("journal writer poisoned by an unrecoverable failed append")]
    Poisoned,
    /// The file holds a few bytes but not a whole header.
    #[error("file is shorter than a journal header but not empty")]
    FileNotEmpty,
    /// A JSON frame is not UTF-8.
    #[error("frame payload is not UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// A JSON frame does not parse or a record does not serialize.
    #[error("frame JSON: {0}")]
    Json(#[from] serde_json::Error),
}
