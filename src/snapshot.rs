//! Published engine state
//!
//! The sampler is the only writer. Each tick builds a complete [`Snapshot`]
//! and swaps it in as a whole through a watch channel, so readers always see
//! one consistent tick and never block the sampler.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::watch;

use crate::{
    Metric, Sample,
    actors::sampler::SamplerState,
    alerts::AlertEvent,
    config::EngineConfig,
    error::{LoadError, PersistenceError, ProbeError},
    window::{RollingWindow, WindowStore},
};

/// Latest status line, as data. Renderers own the wording.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// Nothing sampled yet
    Idle,

    Updated { at: NaiveDateTime },

    /// Last metric (cpu, ram, disk order) above the threshold on this tick
    Warning {
        metric: Metric,
        value: f64,
        at: NaiveDateTime,
    },
}

impl Status {
    pub fn for_tick(sample: &Sample, alerts: &[AlertEvent]) -> Self {
        match alerts.last() {
            Some(alert) => Status::Warning {
                metric: alert.metric,
                value: alert.value,
                at: sample.timestamp,
            },
            None => Status::Updated {
                at: sample.timestamp,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Number of ticks processed so far, successful or not
    pub sequence: u64,

    pub state: SamplerState,

    /// Configuration in effect when the snapshot was built
    pub config: EngineConfig,

    /// Most recent successful sample
    pub sample: Option<Sample>,

    pub windows: WindowStore,

    /// Alerts raised by this tick only
    pub alerts: Vec<AlertEvent>,

    pub status: Status,

    /// Set when this tick's probe failed; everything else is from the last good tick
    pub probe_error: Option<ProbeError>,

    /// Set when this tick's history write failed
    pub persistence_error: Option<PersistenceError>,

    /// Set when the history could not be read at startup
    pub load_error: Option<LoadError>,

    pub history_len: usize,
}

impl Snapshot {
    pub fn initial(config: EngineConfig, window_points: usize) -> Self {
        Self {
            sequence: 0,
            state: SamplerState::Stopped,
            config,
            sample: None,
            windows: WindowStore::new(window_points),
            alerts: Vec::new(),
            status: Status::Idle,
            probe_error: None,
            persistence_error: None,
            load_error: None,
            history_len: 0,
        }
    }

    pub fn window(&self, metric: Metric) -> &RollingWindow<f64> {
        self.windows.window(metric)
    }

    pub fn has_alert(&self, metric: Metric) -> bool {
        self.alerts.iter().any(|alert| alert.metric == metric)
    }
}

/// Single-writer side of the snapshot channel
pub struct SnapshotPublisher {
    sender: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotPublisher {
    pub fn new(initial: Snapshot) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Replace the current snapshot. Works with or without readers.
    pub fn publish(&self, snapshot: Snapshot) {
        self.sender.send_replace(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.sender.subscribe()
    }
}
