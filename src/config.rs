use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ConfigError;

/// Shortest accepted sampling cadence
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 100;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_WARNING_THRESHOLD: f64 = 80.0;

/// Maximum number of samples kept in the history log
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Maximum number of points per rolling window
pub const DEFAULT_WINDOW_POINTS: usize = 60;

/// Runtime-adjustable part of the configuration, owned by the sampler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_interval")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_threshold")]
    pub warning_threshold_percent: f64,
}

fn default_interval() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}

fn default_threshold() -> f64 {
    DEFAULT_WARNING_THRESHOLD
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_interval(),
            warning_threshold_percent: default_threshold(),
        }
    }
}

impl EngineConfig {
    /// Build a validated configuration
    pub fn new(sample_interval_ms: u64, warning_threshold_percent: f64) -> Result<Self, ConfigError> {
        let config = Self {
            sample_interval_ms,
            warning_threshold_percent,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse raw text input, e.g. from a settings form.
    pub fn parse(interval_ms: &str, threshold_percent: &str) -> Result<Self, ConfigError> {
        let sample_interval_ms =
            interval_ms
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::NotANumber {
                    field: "sample_interval_ms",
                    input: interval_ms.to_string(),
                })?;

        let warning_threshold_percent =
            threshold_percent
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::NotANumber {
                    field: "warning_threshold_percent",
                    input: threshold_percent.to_string(),
                })?;

        Self::new(sample_interval_ms, warning_threshold_percent)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms < MIN_SAMPLE_INTERVAL_MS {
            return Err(ConfigError::IntervalTooShort(self.sample_interval_ms));
        }

        // NaN fails the range check as well
        if !(0.0..=100.0).contains(&self.warning_threshold_percent) {
            return Err(ConfigError::ThresholdOutOfRange(
                self.warning_threshold_percent,
            ));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Static engine settings, read once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Durable history file
    pub history_path: PathBuf,

    pub history_capacity: usize,

    /// Points kept per rolling window
    pub window_points: usize,

    /// How long the probe observes the CPU for one utilization reading
    pub cpu_window_ms: u64,

    /// Upper bound for a single probe call
    pub probe_timeout_ms: u64,

    /// Upper bound for a single history write
    pub persist_timeout_ms: u64,

    /// Filesystem whose usage is reported as "disk"
    pub disk_mount_point: PathBuf,

    /// Initial sampling configuration
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("./system_monitor_history.json"),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            window_points: DEFAULT_WINDOW_POINTS,
            cpu_window_ms: 1000,
            probe_timeout_ms: 5000,
            persist_timeout_ms: 5000,
            disk_mount_point: default_mount_point(),
            engine: EngineConfig::default(),
        }
    }
}

fn default_mount_point() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

impl Settings {
    /// Load settings from `path`, or from `~/.config/sysmon/engine.toml` when
    /// it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            let default_path = dirs::config_dir()?.join("sysmon/engine.toml");
            if default_path.exists() {
                Some(default_path)
            } else {
                None
            }
        });

        let settings = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        trace!("loaded settings: {settings:?}");
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `SYSMON_*` environment overrides. Unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        self.history_path = crate::util::get_history_path(self.history_path);
        self.engine.sample_interval_ms = crate::util::get_interval_ms(self.engine.sample_interval_ms);
        self.engine.warning_threshold_percent =
            crate::util::get_threshold(self.engine.warning_threshold_percent);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "history_capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.window_points == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "window_points",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.probe_timeout_ms <= self.cpu_window_ms {
            return Err(ConfigError::InvalidSetting {
                field: "probe_timeout_ms",
                reason: format!(
                    "must exceed the cpu observation window of {} ms",
                    self.cpu_window_ms
                ),
            });
        }

        if self.persist_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "persist_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }

        self.engine.validate()
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_window_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}
