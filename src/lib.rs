pub mod actors;
pub mod alerts;
pub mod config;
pub mod error;
pub mod history;
pub mod monitors;
pub mod snapshot;
pub mod storage;
pub mod util;
pub mod window;

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use actors::messages::EngineEvent;
pub use actors::sampler::{EngineHandle, SamplerState};
pub use alerts::AlertEvent;
pub use config::{EngineConfig, Settings};
pub use error::{ConfigError, EngineError, ExportError, LoadError, PersistenceError, ProbeError};
pub use snapshot::{Snapshot, Status};

/// The three resources every sample observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Ram,
    Disk,
}

impl Metric {
    /// Evaluation and display order.
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Ram, Metric::Disk];
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cpu => write!(f, "cpu"),
            Metric::Ram => write!(f, "ram"),
            Metric::Disk => write!(f, "disk"),
        }
    }
}

/// One timestamped observation of CPU, RAM and disk utilization.
///
/// The serialized form is the history file record: `time`, `cpu`, `ram` and
/// `disk` are always present, the detail fields default to zero so records
/// written without them still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Local wall-clock time, second precision
    #[serde(rename = "time", with = "util::timestamp_format")]
    pub timestamp: NaiveDateTime,

    #[serde(rename = "cpu")]
    pub cpu_percent: f64,

    #[serde(rename = "ram")]
    pub ram_percent: f64,

    #[serde(rename = "disk")]
    pub disk_percent: f64,

    #[serde(default)]
    pub ram_total_bytes: u64,

    #[serde(default)]
    pub ram_used_bytes: u64,

    #[serde(default)]
    pub ram_free_bytes: u64,

    #[serde(default)]
    pub disk_total_bytes: u64,

    #[serde(default)]
    pub disk_used_bytes: u64,

    #[serde(default)]
    pub disk_free_bytes: u64,

    #[serde(default)]
    pub logical_cpu_count: usize,

    #[serde(default)]
    pub physical_cpu_count: usize,
}

impl Sample {
    /// Utilization of `metric` in percent.
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Ram => self.ram_percent,
            Metric::Disk => self.disk_percent,
        }
    }
}
