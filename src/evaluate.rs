use crate::collectors::{CollectError, Metric, Readings};

/// Safe bands for every metric. Bounds are inclusive: a reading equal to a
/// bound is still safe.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub min_temperature_celsius: f64,
    pub max_temperature_celsius: f64,
    pub min_fan_rpm: f64,
    pub max_fan_rpm: f64,
    pub min_clock_ghz: f64,
    pub max_cpu_usage_percent: f64,
    pub max_memory_usage_percent: f64,
    pub max_disk_usage_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_temperature_celsius: 80.0,
            max_temperature_celsius: 90.0,
            min_fan_rpm: 3500.0,
            max_fan_rpm: 5000.0,
            min_clock_ghz: 3.20,
            max_cpu_usage_percent: 80.0,
            max_memory_usage_percent: 80.0,
            max_disk_usage_percent: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Safe(String),
    Alert(String),
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub lines: Vec<StatusLine>,
}

impl Evaluation {
    pub fn safe_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            StatusLine::Safe(text) => Some(text.as_str()),
            StatusLine::Alert(_) => None,
        })
    }

    pub fn report(&self) -> AlertReport {
        AlertReport {
            lines: self
                .lines
                .iter()
                .filter_map(|line| match line {
                    StatusLine::Alert(text) => Some(text.clone()),
                    StatusLine::Safe(_) => None,
                })
                .collect(),
        }
    }

    fn safe(&mut self, text: String) {
        self.lines.push(StatusLine::Safe(text));
    }

    fn alert(&mut self, text: String) {
        self.lines.push(StatusLine::Alert(text));
    }

    fn failed(&mut self, metric: Metric, err: &CollectError) {
        self.alert(format!("Alert: {metric} could not be collected: {err}"));
    }
}

/// Ordered alert lines of one run. Empty means every reading was safe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertReport {
    lines: Vec<String>,
}

impl AlertReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Email body: every line newline-terminated.
    pub fn body(&self) -> String {
        self.lines.iter().map(|line| format!("{line}\n")).collect()
    }
}

fn outside(value: f64, min: f64, max: f64) -> bool {
    value < min || value > max
}

pub fn evaluate(readings: &Readings, thresholds: &Thresholds) -> Evaluation {
    let mut eval = Evaluation::default();

    match &readings.temperatures {
        Ok(temps) => {
            for t in temps {
                if outside(
                    t.celsius,
                    thresholds.min_temperature_celsius,
                    thresholds.max_temperature_celsius,
                ) {
                    eval.alert(format!(
                        "Alert: CPU Temperature [{}] is out of safe range: {:.2}°C",
                        t.sensor, t.celsius
                    ));
                } else {
                    eval.safe(format!(
                        "CPU Temperature [{}]: {:.2}°C (Safe)",
                        t.sensor, t.celsius
                    ));
                }
            }
        }
        Err(err) => eval.failed(Metric::Temperature, err),
    }

    match &readings.fan_speeds {
        Ok(fans) => {
            for f in fans {
                let rpm = f.rpm as f64;
                if outside(rpm, thresholds.min_fan_rpm, thresholds.max_fan_rpm) {
                    eval.alert(format!(
                        "Alert: Fan speed [{}] is out of safe range: {:.2} RPM",
                        f.fan, rpm
                    ));
                } else {
                    eval.safe(format!("Fan speed [{}]: {:.2} RPM (Safe)", f.fan, rpm));
                }
            }
        }
        Err(err) => eval.failed(Metric::FanSpeed, err),
    }

    match &readings.clock_speeds {
        Ok(clocks) => {
            for c in clocks {
                if c.ghz < thresholds.min_clock_ghz {
                    eval.alert(format!(
                        "Alert: CPU {} Clock Speed is below {:.2} GHz: {:.2} GHz",
                        c.cpu, thresholds.min_clock_ghz, c.ghz
                    ));
                } else {
                    eval.safe(format!("CPU {} Clock Speed: {:.2} GHz (Safe)", c.cpu, c.ghz));
                }
            }
        }
        Err(err) => eval.failed(Metric::ClockSpeed, err),
    }

    match &readings.cpu_usage {
        Ok(cores) => {
            for (i, usage) in cores.iter().enumerate() {
                if *usage > thresholds.max_cpu_usage_percent {
                    eval.alert(format!(
                        "Alert: CPU Core {i} usage is above {}%: {usage:.2}%",
                        thresholds.max_cpu_usage_percent
                    ));
                } else {
                    eval.safe(format!("CPU Core {i} usage: {usage:.2}% (Safe)"));
                }
            }
        }
        Err(err) => eval.failed(Metric::CpuUsage, err),
    }

    match &readings.memory_usage {
        Ok(used) => {
            if *used > thresholds.max_memory_usage_percent {
                eval.alert(format!(
                    "Alert: Memory usage is above {}%: {used:.2}%",
                    thresholds.max_memory_usage_percent
                ));
            } else {
                eval.safe(format!("Memory usage: {used:.2}% (Safe)"));
            }
        }
        Err(err) => eval.failed(Metric::MemoryUsage, err),
    }

    match &readings.disk_usage {
        Ok(used) => {
            if *used > thresholds.max_disk_usage_percent {
                eval.alert(format!(
                    "Alert: Disk usage is above {}%: {used:.2}%",
                    thresholds.max_disk_usage_percent
                ));
            } else {
                eval.safe(format!("Disk usage: {used:.2}% (Safe)"));
            }
        }
        Err(err) => eval.failed(Metric::DiskUsage, err),
    }

    eval
}
