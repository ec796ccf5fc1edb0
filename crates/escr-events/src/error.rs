use std::io;

/// Errors produced while reading or writing event logs.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A line of the log could not be decoded into an envelope.
    #[error("malformed event at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// Sequence numbers must be strictly increasing.
    #[error("event at line {line} has sequence number {found}, expected more than {previous}")]
    OutOfOrder { line: usize, previous: u64, found: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the events crate.
pub type EventResult<T> = std::result::Result<T, EventError>;
