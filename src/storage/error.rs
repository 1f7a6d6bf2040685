//! Error types for storage operations

use std::fmt;
use std::time::Duration;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing history
#[derive(Debug)]
pub enum StorageError {
    /// Stored data is not a valid history document
    Corrupt(String),

    /// History could not be encoded
    SerializationError(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),

    /// Operation did not finish in time
    Timeout(Duration),

    /// Blocking worker died before answering
    WorkerFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Corrupt(msg) => write!(f, "stored history is corrupt: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "history serialization error: {}", msg)
            }
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
            StorageError::Timeout(limit) => {
                write!(f, "storage operation timed out after {} ms", limit.as_millis())
            }
            StorageError::WorkerFailed(msg) => write!(f, "storage worker failed: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::WorkerFailed(err.to_string())
    }
}
