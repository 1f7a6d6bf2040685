//! Capped, durable history of samples
//!
//! The in-memory sequence is authoritative. After every change the full
//! sequence is handed to the [`HistoryStore`]; a failed write is reported but
//! never rolls back or loses the in-memory state.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use crate::{
    Sample,
    error::{ExportError, LoadError, PersistenceError},
    storage::{HistoryStore, json::write_samples},
};

pub struct HistoryLog {
    entries: VecDeque<Sample>,
    capacity: usize,
    store: Arc<dyn HistoryStore>,
}

impl HistoryLog {
    /// Empty log backed by `store`. Call [`HistoryLog::load`] to pick up what
    /// an earlier run persisted.
    pub fn new(store: Arc<dyn HistoryStore>, capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            store,
        }
    }

    /// Replace the in-memory sequence with the stored one.
    ///
    /// Missing storage yields an empty log and no error. Unreadable storage
    /// also yields an empty log, the error is returned for reporting only.
    #[instrument(skip(self), fields(location = %self.store.location()))]
    pub async fn load(&mut self) -> Result<(), LoadError> {
        self.entries.clear();

        let samples = match self.store.load().await {
            Ok(Some(samples)) => samples,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("starting with empty history: {e}");
                return Err(LoadError {
                    path: self.store.location().into(),
                    reason: e.to_string(),
                });
            }
        };

        let skip = samples.len().saturating_sub(self.capacity);
        if skip > 0 {
            debug!("stored history exceeds capacity, dropping {skip} oldest samples");
        }
        self.entries.extend(samples.into_iter().skip(skip));

        debug!("loaded {} samples", self.entries.len());
        Ok(())
    }

    /// Add `sample`, evicting the oldest entry when over capacity, then persist.
    pub async fn append(&mut self, sample: Sample) -> Result<(), PersistenceError> {
        self.entries.push_back(sample);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        trace!("history holds {} samples", self.entries.len());
        self.persist().await
    }

    /// Empty the log and persist the empty state immediately.
    pub async fn clear(&mut self) -> Result<(), PersistenceError> {
        debug!("clearing {} samples", self.entries.len());
        self.entries.clear();
        self.persist().await
    }

    /// Write the current sequence to `path`, independent of the primary store.
    pub async fn export_to(&self, path: &Path, io_timeout: Duration) -> Result<(), ExportError> {
        export_samples(path, &self.to_vec(), io_timeout).await
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        self.store
            .persist(self.to_vec())
            .await
            .map_err(|e| PersistenceError(e.to_string()))
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.entries.iter()
    }

    /// The last `count` samples, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Sample> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Write `samples` to an arbitrary `path` in the history file format.
#[instrument(skip(samples), fields(path = %path.display(), count = samples.len()))]
pub async fn export_samples(
    path: &Path,
    samples: &[Sample],
    io_timeout: Duration,
) -> Result<(), ExportError> {
    write_samples(path, samples, io_timeout)
        .await
        .map_err(|source| ExportError {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("exported {} samples", samples.len());
    Ok(())
}
