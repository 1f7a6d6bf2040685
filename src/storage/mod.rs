//! Durable backends for the history log
//!
//! The history log keeps the authoritative sequence in memory and hands the
//! full sequence to a [`HistoryStore`] after every change.
//!
//! ## Backends
//!
//! - **JSON file** (default): pretty-printed JSON array, replaced atomically
//! - **In-Memory**: no persistence, for tests or throwaway sessions

pub mod backend;
pub mod error;
pub mod json;
pub mod memory;

pub use backend::HistoryStore;
pub use error::{StorageError, StorageResult};
pub use json::JsonFileStore;
pub use memory::MemoryStore;
