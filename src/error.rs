//! Centralized error types for mailtally.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailtally library.
#[derive(Error, Debug)]
pub enum TallyError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified log file does not exist.
    #[error("Log file not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration file could not be parsed.
    #[error("Invalid config file '{path}': {message}")]
    Config { path: PathBuf, message: String },

    /// A buffer was used outside its contract.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Rendering or writing the report failed.
    #[error("Output error: {0}")]
    Output(String),
}

/// Convenience alias for `Result<T, TallyError>`.
pub type Result<T> = std::result::Result<T, TallyError>;

impl TallyError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Misuse of a [`BatchQueue`](crate::queue::BatchQueue).
///
/// These indicate a bug in the caller, never bad input data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// `pop_batch` was called with a size below 1.
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    /// A pop was attempted on an empty queue.
    #[error("no elements in buffer")]
    Empty,
}

/// Why a qualifying log line could not be turned into a mail record.
///
/// Every variant is recoverable: the line is skipped and the run goes on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The leading `date-time` token is absent or not `YYYY:MM:DD-HH:MM:SS`.
    #[error("malformed timestamp <{0}>")]
    MalformedTimestamp(String),

    /// The `from` field is absent or empty.
    #[error("empty <from>")]
    MissingFrom,

    /// The `from` field is not a valid address.
    #[error("from <{0}> is not an e-mail address")]
    InvalidFromAddress(String),

    /// The `to` field is absent or empty.
    #[error("empty <to>")]
    MissingTo,

    /// The `to` field is not a valid address.
    #[error("to <{0}> is not an e-mail address")]
    InvalidToAddress(String),

    /// No `subject` field, or an empty one in strict mode.
    #[error("subject missing")]
    MissingSubject,

    /// The `queueid` field is absent or empty.
    #[error("queue id missing")]
    MissingQueueId,
}

impl ExtractionFailure {
    /// Stable kebab-case reason code, used as a structured log field.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedTimestamp(_) => "malformed-timestamp",
            Self::MissingFrom => "missing-from",
            Self::InvalidFromAddress(_) => "invalid-from-address",
            Self::MissingTo => "missing-to",
            Self::InvalidToAddress(_) => "invalid-to-address",
            Self::MissingSubject => "missing-subject",
            Self::MissingQueueId => "missing-queue-id",
        }
    }
}
