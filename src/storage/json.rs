//! JSON file history store
//!
//! The file holds a single JSON array of samples, indented with four spaces
//! and with non-ASCII text left unescaped. Every write goes to a temporary
//! file in the same directory which is then renamed over the target, so a
//! crash mid-write leaves the previous document intact.
//!
//! Writes to one store land in the order they were issued. A write that
//! outlived its timeout and finishes after a newer one is discarded.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, trace};

use super::backend::HistoryStore;
use super::error::{StorageError, StorageResult};
use crate::Sample;

/// Clones share the write ordering of the original.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    io_timeout: Duration,
    writes: Arc<WriteOrder>,
}

#[derive(Default)]
struct WriteOrder {
    /// Generation handed to the most recently issued write
    issued: AtomicU64,

    /// Generation of the write currently on disk
    landed: Mutex<u64>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            io_timeout,
            writes: Arc::new(WriteOrder::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> StorageResult<Option<Vec<Sample>>> {
        let path = self.path.clone();
        let read = tokio::task::spawn_blocking(move || std::fs::read(path));

        let bytes = match bounded(self.io_timeout, read).await? {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no history file yet");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let samples = decode(&bytes)?;
        trace!("read {} samples", samples.len());
        Ok(Some(samples))
    }

    #[instrument(skip(self, samples), fields(path = %self.path.display(), count = samples.len()))]
    async fn persist(&self, samples: Vec<Sample>) -> StorageResult<()> {
        let bytes = encode(&samples)?;
        let generation = self.writes.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let writes = self.writes.clone();
        let path = self.path.clone();

        let write = tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut landed = match writes.landed.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *landed > generation {
                debug!("dropping write {generation}, write {} already landed", *landed);
                return Ok(());
            }

            std::fs::create_dir_all(parent_dir(&path))?;
            write_atomic(&path, &bytes)?;
            *landed = generation;
            Ok(())
        });

        bounded(self.io_timeout, write).await?
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write `samples` to `path` in the history file format.
///
/// The parent directory must exist. On failure nothing is left behind at
/// `path` or next to it.
pub async fn write_samples(path: &Path, samples: &[Sample], io_timeout: Duration) -> StorageResult<()> {
    let bytes = encode(samples)?;
    let path = path.to_path_buf();
    let write = tokio::task::spawn_blocking(move || write_atomic(&path, &bytes));

    bounded(io_timeout, write).await??;
    Ok(())
}

async fn bounded<T>(
    limit: Duration,
    task: tokio::task::JoinHandle<T>,
) -> StorageResult<T> {
    match tokio::time::timeout(limit, task).await {
        Ok(joined) => Ok(joined?),
        Err(_) => Err(StorageError::Timeout(limit)),
    }
}

pub fn encode(samples: &[Sample]) -> StorageResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(samples.len() * 128 + 2);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);

    samples
        .serialize(&mut serializer)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> StorageResult<Vec<Sample>> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt(e.to_string()))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut file = NamedTempFile::new_in(parent_dir(path))?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StorageError::IoError(e.error))?;

    Ok(())
}
