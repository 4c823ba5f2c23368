use crate::collectors::command::run_command;
use crate::collectors::sensors::SensorGrammar;
use crate::collectors::{ClockReading, CollectError, Collector, FanReading, TemperatureReading};
use crate::config::{CollectConfig, ConfigError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tracing::{debug, info};

/// Reads the live host: sensor utilities for temperature and fans, `sysinfo`
/// for everything else.
pub struct HostCollector {
    system: System,
    grammar: SensorGrammar,
    temperature_command: Vec<String>,
    fan_command: Vec<String>,
    disk_mount: PathBuf,
    command_timeout: Duration,
    cpu_sample_interval: Duration,
}

impl HostCollector {
    pub fn new(cfg: &CollectConfig) -> Result<Self, ConfigError> {
        let grammar = SensorGrammar::new(&cfg.fan_marker)
            .map_err(|err| ConfigError::Validation(format!("collect.fan_marker: {err}")))?;

        Ok(Self {
            system: System::new(),
            grammar,
            temperature_command: cfg.temperature_command.clone(),
            fan_command: cfg.fan_command.clone(),
            disk_mount: PathBuf::from(&cfg.disk_mount),
            command_timeout: cfg.command_timeout()?,
            cpu_sample_interval: cfg.cpu_sample_interval()?,
        })
    }
}

#[async_trait]
impl Collector for HostCollector {
    async fn temperatures(&mut self) -> Result<Vec<TemperatureReading>, CollectError> {
        let text = run_command(&self.temperature_command, self.command_timeout).await?;
        let temps = self.grammar.parse_temperatures(&text)?;
        debug!(sensors = temps.len(), "temperatures parsed");
        Ok(temps)
    }

    async fn fan_speeds(&mut self) -> Result<Vec<FanReading>, CollectError> {
        let text = run_command(&self.fan_command, self.command_timeout).await?;
        let fans = self.grammar.parse_fan_speeds(&text)?;
        if fans.is_empty() {
            info!("no fan readings reported, skipping fan check");
        }
        Ok(fans)
    }

    async fn clock_speeds(&mut self) -> Result<Vec<ClockReading>, CollectError> {
        self.system.refresh_cpu();
        let clocks: Vec<ClockReading> = self
            .system
            .cpus()
            .iter()
            .enumerate()
            .map(|(cpu, c)| ClockReading {
                cpu,
                ghz: c.frequency() as f64 / 1000.0,
            })
            .collect();
        if clocks.is_empty() {
            return Err(CollectError::NoCpus);
        }
        Ok(clocks)
    }

    async fn cpu_usage(&mut self) -> Result<Vec<f64>, CollectError> {
        // Usage is a delta between two refreshes.
        self.system.refresh_cpu();
        tokio::time::sleep(self.cpu_sample_interval).await;
        self.system.refresh_cpu();

        let usage: Vec<f64> = self
            .system
            .cpus()
            .iter()
            .map(|c| c.cpu_usage() as f64)
            .collect();
        if usage.is_empty() {
            return Err(CollectError::NoCpus);
        }
        Ok(usage)
    }

    async fn memory_usage(&mut self) -> Result<f64, CollectError> {
        self.system.refresh_memory();
        used_percent(self.system.used_memory(), self.system.total_memory())
            .ok_or(CollectError::MemoryUnavailable)
    }

    async fn disk_usage(&mut self) -> Result<f64, CollectError> {
        self.system.refresh_disks_list();
        let disk = self
            .system
            .disks()
            .iter()
            .find(|d| same_mount(d.mount_point(), &self.disk_mount))
            .ok_or_else(|| CollectError::DiskNotFound {
                mount: self.disk_mount.display().to_string(),
            })?;

        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        used_percent(used, total).ok_or_else(|| CollectError::DiskNotFound {
            mount: self.disk_mount.display().to_string(),
        })
    }
}

fn used_percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((used as f64 / total as f64) * 100.0)
}

fn same_mount(mount_point: &Path, wanted: &Path) -> bool {
    if mount_point == wanted {
        return true;
    }
    // Windows reports "C:\" while users tend to write "C:".
    let a = mount_point.to_string_lossy();
    let b = wanted.to_string_lossy();
    a.trim_end_matches(['/', '\\']) == b.trim_end_matches(['/', '\\'])
}
