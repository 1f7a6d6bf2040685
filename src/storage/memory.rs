//! In-memory history store (no persistence)
//!
//! Useful for:
//! - Testing without touching the filesystem
//! - Sessions where history should not outlive the process

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::trace;

use super::backend::HistoryStore;
use super::error::StorageResult;
use crate::Sample;

#[derive(Default)]
pub struct MemoryStore {
    stored: Mutex<Option<Vec<Sample>>>,
    persist_count: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `samples`, as if written by an earlier run.
    pub fn with_samples(samples: Vec<Sample>) -> Self {
        Self {
            stored: Mutex::new(Some(samples)),
            persist_count: AtomicU64::new(0),
        }
    }

    /// Copy of what was last persisted
    pub fn stored(&self) -> Option<Vec<Sample>> {
        match self.stored.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of persist operations performed
    pub fn persist_count(&self) -> u64 {
        self.persist_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load(&self) -> StorageResult<Option<Vec<Sample>>> {
        Ok(self.stored())
    }

    async fn persist(&self, samples: Vec<Sample>) -> StorageResult<()> {
        trace!("in-memory store: keeping {} samples", samples.len());

        let mut guard = match self.stored.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(samples);
        self.persist_count.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
