//! Error taxonomy of the engine
//!
//! Engine-internal failures (probe, load, persistence) never stop the sampler,
//! they travel on the event channel and inside snapshots. Caller-invoked
//! failures (config, export) are returned to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to read the host's resource counters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("resource counters unavailable: {0}")]
    Unavailable(String),

    #[error("no disk mounted at {0}")]
    DeviceNotFound(String),

    #[error("malformed reading: {0}")]
    Malformed(String),

    #[error("probe did not answer within {0} ms")]
    Timeout(u64),
}

/// Rejected engine configuration; the previous configuration stays active
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} is not a number: {input:?}")]
    NotANumber { field: &'static str, input: String },

    #[error("sample interval {0} ms is below the 100 ms floor")]
    IntervalTooShort(u64),

    #[error("warning threshold {0} is outside 0..=100")]
    ThresholdOutOfRange(f64),

    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// History could not be read at startup; the engine starts with an empty log
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to load history from {path}: {reason}")]
pub struct LoadError {
    pub path: PathBuf,
    pub reason: String,
}

/// History could not be written; the in-memory log is unaffected
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to persist history: {0}")]
pub struct PersistenceError(pub String);

/// Explicit export of the history failed
#[derive(Debug, Error)]
#[error("failed to export history to {path}: {source}")]
pub struct ExportError {
    pub path: PathBuf,
    #[source]
    pub source: crate::storage::StorageError,
}

/// Errors returned by [`crate::EngineHandle`] calls
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("sampler is stopped")]
    NotRunning,

    #[error("sampler is no longer running: {0}")]
    Closed(&'static str),
}
