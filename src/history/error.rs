//! Error types for the history store and the export/import engine.

use crate::codec::CodecError;
use std::fmt;

/// Errors that can occur during history operations.
///
/// Storage failures are terminal for the operation that triggered them;
/// nothing in this crate retries.
#[derive(Debug)]
pub enum HistoryError {
    /// The data directory cannot be created or written to.
    StorageUnavailable(String),

    /// The on-disk schema could not be brought to the requested version.
    SchemaUpgradeFailed(String),

    /// A write transaction (put, delete, clear) did not commit.
    WriteFailed(String),

    /// A read transaction did not complete.
    ReadFailed(String),

    /// An import document is malformed or fails schema validation.
    InvalidFormat(String),

    /// No record is stored under the requested id.
    NotFound(String),
}

impl HistoryError {
    pub(crate) fn write_failed(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        HistoryError::WriteFailed(format!("{}: {}", context, err))
    }

    pub(crate) fn read_failed(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        HistoryError::ReadFailed(format!("{}: {}", context, err))
    }
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::StorageUnavailable(msg) => {
                write!(f, "History storage unavailable: {}", msg)
            }
            HistoryError::SchemaUpgradeFailed(msg) => {
                write!(f, "History schema upgrade failed: {}", msg)
            }
            HistoryError::WriteFailed(msg) => write!(f, "History write failed: {}", msg),
            HistoryError::ReadFailed(msg) => write!(f, "History read failed: {}", msg),
            HistoryError::InvalidFormat(msg) => {
                write!(f, "Invalid history document: {}", msg)
            }
            HistoryError::NotFound(id) => write!(f, "History record not found: {}", id),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<CodecError> for HistoryError {
    fn from(err: CodecError) -> Self {
        HistoryError::InvalidFormat(err.to_string())
    }
}
