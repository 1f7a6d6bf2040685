use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::{instrument, trace, warn};

use crate::{Sample, config::Settings, error::ProbeError, util::now_timestamp};

/// Source of resource readings.
///
/// The CPU observation window is an implementation detail of the probe and is
/// unrelated to the sampling cadence.
#[async_trait]
pub trait Probe: Send {
    async fn sample(&mut self) -> Result<Sample, ProbeError>;
}

/// Run `probe` but give up after `limit`.
pub async fn sample_within(probe: &mut dyn Probe, limit: Duration) -> Result<Sample, ProbeError> {
    match tokio::time::timeout(limit, probe.sample()).await {
        Ok(result) => result,
        Err(_) => {
            warn!("probe exceeded {} ms", limit.as_millis());
            Err(ProbeError::Timeout(limit.as_millis() as u64))
        }
    }
}

/// Probe backed by the host's counters through `sysinfo`
pub struct SysinfoProbe {
    system: System,
    disks: Disks,
    mount_point: PathBuf,
    cpu_window: Duration,
}

impl SysinfoProbe {
    pub fn new(mount_point: impl Into<PathBuf>, cpu_window: Duration) -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
            .with_memory(MemoryRefreshKind::nothing().with_ram());

        Self {
            system: System::new_with_specifics(refresh_kind),
            disks: Disks::new_with_refreshed_list(),
            mount_point: mount_point.into(),
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.disk_mount_point.clone(), settings.cpu_window())
    }

    async fn cpu_usage(&mut self) -> Result<(f64, usize), ProbeError> {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(self.cpu_window).await;
        self.system.refresh_cpu_usage();

        let logical = self.system.cpus().len();
        if logical == 0 {
            return Err(ProbeError::Unavailable("no CPUs reported".to_string()));
        }

        Ok((f64::from(self.system.global_cpu_usage()), logical))
    }

    fn memory(&mut self) -> Result<MemoryReading, ProbeError> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable(
                "memory counters report zero total".to_string(),
            ));
        }

        Ok(MemoryReading {
            total,
            used: self.system.used_memory(),
            free: self.system.free_memory(),
            available: self.system.available_memory(),
        })
    }

    fn disk(&mut self) -> Result<DiskReading, ProbeError> {
        self.disks.refresh(true);

        let disk = self
            .disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == self.mount_point.as_path())
            .ok_or_else(|| ProbeError::DeviceNotFound(self.mount_point.display().to_string()))?;

        Ok(DiskReading {
            total: disk.total_space(),
            available: disk.available_space(),
        })
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

#[async_trait]
impl Probe for SysinfoProbe {
    #[instrument(skip(self), fields(mount = %self.mount_point.display()))]
    async fn sample(&mut self) -> Result<Sample, ProbeError> {
        let (cpu_percent, logical_cpu_count) = self.cpu_usage().await?;
        let memory = self.memory()?;
        let disk = self.disk()?;

        let sample = build_sample(
            cpu_percent,
            memory,
            disk,
            logical_cpu_count,
            System::physical_core_count().unwrap_or_default(),
        )?;

        trace!(
            "cpu {:.1}%, ram {:.1}%, disk {:.1}%",
            sample.cpu_percent, sample.ram_percent, sample.disk_percent
        );

        Ok(sample)
    }
}

#[derive(Debug, Clone, Copy)]
struct MemoryReading {
    total: u64,
    used: u64,
    free: u64,
    available: u64,
}

#[derive(Debug, Clone, Copy)]
struct DiskReading {
    total: u64,
    available: u64,
}

fn build_sample(
    cpu_percent: f64,
    memory: MemoryReading,
    disk: DiskReading,
    logical_cpu_count: usize,
    physical_cpu_count: usize,
) -> Result<Sample, ProbeError> {
    let disk_used = disk.total.saturating_sub(disk.available);

    Ok(Sample {
        timestamp: now_timestamp(),
        cpu_percent: checked_percent("cpu", cpu_percent)?,
        ram_percent: checked_percent(
            "ram",
            percent(memory.total.saturating_sub(memory.available), memory.total)?,
        )?,
        disk_percent: checked_percent("disk", percent(disk_used, disk.total)?)?,
        ram_total_bytes: memory.total,
        ram_used_bytes: memory.used,
        ram_free_bytes: memory.free,
        disk_total_bytes: disk.total,
        disk_used_bytes: disk_used,
        disk_free_bytes: disk.available,
        logical_cpu_count,
        physical_cpu_count,
    })
}

fn percent(part: u64, total: u64) -> Result<f64, ProbeError> {
    if total == 0 {
        return Err(ProbeError::Malformed("total size is zero".to_string()));
    }
    Ok(part as f64 / total as f64 * 100.0)
}

/// Reject non-finite readings and round to one decimal like the history file.
fn checked_percent(metric: &str, value: f64) -> Result<f64, ProbeError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProbeError::Malformed(format!("{metric} reading {value}")));
    }
    Ok(((value * 10.0).round() / 10.0).min(100.0))
}
