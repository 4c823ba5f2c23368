pub mod command;
pub mod sensors;
pub mod system;

use async_trait::async_trait;
use sensors::ParseError;
use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureReading {
    pub sensor: String,
    pub celsius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanReading {
    pub fan: String,
    pub rpm: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockReading {
    pub cpu: usize,
    pub ghz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    FanSpeed,
    ClockSpeed,
    CpuUsage,
    MemoryUsage,
    DiskUsage,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Temperature => "CPU temperature",
            Metric::FanSpeed => "Fan speed",
            Metric::ClockSpeed => "CPU clock speed",
            Metric::CpuUsage => "CPU usage",
            Metric::MemoryUsage => "Memory usage",
            Metric::DiskUsage => "Disk usage",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("could not start '{program}': {source}")]
    CommandSpawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' failed with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("'{program}' did not finish within {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("the operating system reported no CPUs")]
    NoCpus,
    #[error("no disk mounted at {mount}")]
    DiskNotFound { mount: String },
    #[error("the operating system reported zero total memory")]
    MemoryUnavailable,
}

/// A collection failure tagged with the metric it interrupted.
#[derive(Debug, Error)]
#[error("collecting {metric} failed: {source}")]
pub struct MetricError {
    pub metric: Metric,
    #[source]
    pub source: CollectError,
}

#[async_trait]
pub trait Collector: Send {
    async fn temperatures(&mut self) -> Result<Vec<TemperatureReading>, CollectError>;
    async fn fan_speeds(&mut self) -> Result<Vec<FanReading>, CollectError>;
    async fn clock_speeds(&mut self) -> Result<Vec<ClockReading>, CollectError>;
    async fn cpu_usage(&mut self) -> Result<Vec<f64>, CollectError>;
    async fn memory_usage(&mut self) -> Result<f64, CollectError>;
    async fn disk_usage(&mut self) -> Result<f64, CollectError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Abort the pass on the first failing metric.
    FailFast,
    /// Record the failure in its slot and move on.
    KeepGoing,
}

/// Everything gathered in one pass. A slot only holds `Err` in keep-going mode.
#[derive(Debug)]
pub struct Readings {
    pub temperatures: Result<Vec<TemperatureReading>, CollectError>,
    pub fan_speeds: Result<Vec<FanReading>, CollectError>,
    pub clock_speeds: Result<Vec<ClockReading>, CollectError>,
    pub cpu_usage: Result<Vec<f64>, CollectError>,
    pub memory_usage: Result<f64, CollectError>,
    pub disk_usage: Result<f64, CollectError>,
}

pub async fn collect<C>(collector: &mut C, mode: FailureMode) -> Result<Readings, MetricError>
where
    C: Collector + ?Sized,
{
    let temperatures = settle(Metric::Temperature, collector.temperatures().await, mode)?;
    let fan_speeds = settle(Metric::FanSpeed, collector.fan_speeds().await, mode)?;
    let clock_speeds = settle(Metric::ClockSpeed, collector.clock_speeds().await, mode)?;
    let cpu_usage = settle(Metric::CpuUsage, collector.cpu_usage().await, mode)?;
    let memory_usage = settle(Metric::MemoryUsage, collector.memory_usage().await, mode)?;
    let disk_usage = settle(Metric::DiskUsage, collector.disk_usage().await, mode)?;

    Ok(Readings {
        temperatures,
        fan_speeds,
        clock_speeds,
        cpu_usage,
        memory_usage,
        disk_usage,
    })
}

fn settle<T>(
    metric: Metric,
    result: Result<T, CollectError>,
    mode: FailureMode,
) -> Result<Result<T, CollectError>, MetricError> {
    match result {
        Ok(value) => {
            debug!(metric = %metric, "metric collected");
            Ok(Ok(value))
        }
        Err(err) if mode == FailureMode::KeepGoing => {
            warn!(metric = %metric, error = %err, "collection failed, skipping metric");
            Ok(Err(err))
        }
        Err(source) => Err(MetricError { metric, source }),
    }
}
