//! History store trait definition

use async_trait::async_trait;

use super::error::StorageResult;
use crate::Sample;

/// Durable backing for the history log
///
/// Stores always receive and return the complete, chronologically ordered
/// sequence. Implementations must be `Send + Sync` as the sampler task owns
/// them across await points.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Read the stored sequence.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet, which is not an
    /// error.
    async fn load(&self) -> StorageResult<Option<Vec<Sample>>>;

    /// Replace the stored sequence with `samples`.
    async fn persist(&self, samples: Vec<Sample>) -> StorageResult<()>;

    /// Human-readable location, used in logs and load errors
    fn location(&self) -> String;
}
