//! Message types for sampler communication
//!
//! 1. **Commands**: requests from the host, sent to the sampler via mpsc
//! 2. **Events**: notifications broadcast to any number of subscribers

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    alerts::AlertEvent,
    config::EngineConfig,
    error::{ConfigError, LoadError, PersistenceError, ProbeError},
    snapshot::Snapshot,
};

/// Event broadcast by the sampler
///
/// The broadcast channel may lag for slow subscribers. Anything that must not
/// be missed is also carried by the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started { config: EngineConfig },

    Stopped,

    Reconfigured { config: EngineConfig },

    /// A metric exceeded the warning threshold on the latest tick
    Alert(AlertEvent),

    /// The probe failed; the tick was skipped
    ProbeFailed(ProbeError),

    /// The history could not be written; in-memory history is intact
    PersistenceFailed(PersistenceError),

    /// The history could not be read at startup; the engine started empty
    LoadFailed(LoadError),

    HistoryCleared,
}

/// Commands that can be sent to the sampler
#[derive(Debug)]
pub enum SamplerCommand {
    /// Begin periodic sampling, optionally with a new configuration
    Start {
        config: Option<EngineConfig>,
        respond_to: oneshot::Sender<Result<(), ConfigError>>,
    },

    /// Stop periodic sampling; windows and history are kept
    Stop { respond_to: oneshot::Sender<()> },

    /// Replace the configuration; takes effect from the next tick
    Reconfigure {
        config: EngineConfig,
        respond_to: oneshot::Sender<Result<(), ConfigError>>,
    },

    /// Empty the history and persist the empty state
    ClearHistory {
        respond_to: oneshot::Sender<Result<(), PersistenceError>>,
    },

    /// Run one tick immediately, bypassing the interval timer
    ///
    /// Answers `None` while stopped.
    SampleNow {
        respond_to: oneshot::Sender<Option<Arc<Snapshot>>>,
    },

    /// Stop and exit the sampler task
    Shutdown,
}
