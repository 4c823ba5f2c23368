//! Grammar for the text printed by temperature/fan utilities such as
//! `sensors` (lm-sensors) and `osx-cpu-temp`.
//!
//! Temperatures: on each line, the first signed decimal immediately followed
//! by an optional space and `°C` that is not an annotation is the reading.
//! An annotation is a value preceded by `=` (`high = +80.0°C`), so lines that
//! only continue the previous sensor's limits yield nothing. The label is the
//! text before the first `:` preceding the reading.
//!
//! ```text
//! Core 0:        +45.0°C  (high = +80.0°C, crit = +100.0°C)
//! Composite:    +38.9°C  (low  = -273.1°C, high = +84.8°C)
//!                        (crit = +94.8°C)
//! 61.8°C
//! ```
//!
//! Fans: a line containing the fan marker (case-insensitive) carries a reading
//! when it contains an integer followed by `RPM` that is not an annotation.
//! The label is the text before the first `:` or ` at `.
//!
//! ```text
//! fan1:        3600 RPM  (min =  600 RPM)
//! Fan 0 - Left side   at 1758 RPM (31%)
//! ```

use crate::collectors::{FanReading, TemperatureReading};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no temperature reading (a signed number followed by °C) in command output")]
    NoTemperature,
    #[error("lines mentioning '{marker}' carry no RPM value")]
    NoFanSpeed { marker: String },
    #[error("'{token}' is not a valid number")]
    InvalidNumber { token: String },
    #[error("invalid sensor pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct SensorGrammar {
    temperature: Regex,
    rpm: Regex,
    fan_marker: String,
}

impl SensorGrammar {
    pub fn new(fan_marker: &str) -> Result<Self, ParseError> {
        Ok(Self {
            temperature: Regex::new(r"([+-]?\d+(?:\.\d+)?) ?°C")?,
            rpm: Regex::new(r"(\d+)\s*RPM")?,
            fan_marker: fan_marker.trim().to_lowercase(),
        })
    }

    pub fn parse_temperatures(&self, text: &str) -> Result<Vec<TemperatureReading>, ParseError> {
        let mut out = Vec::new();
        for line in text.lines() {
            let Some((whole, number)) = first_reading(&self.temperature, line) else {
                continue;
            };
            let celsius = parse_number::<f64>(number.as_str())?;
            let sensor = label_before(&line[..whole.start()], &[":"])
                .unwrap_or_else(|| format!("sensor {}", out.len()));
            out.push(TemperatureReading { sensor, celsius });
        }

        if out.is_empty() {
            return Err(ParseError::NoTemperature);
        }
        Ok(out)
    }

    /// An output without any fan line yields an empty list: plenty of hosts
    /// have no tachometer exposed.
    pub fn parse_fan_speeds(&self, text: &str) -> Result<Vec<FanReading>, ParseError> {
        let mut out = Vec::new();
        let mut saw_fan_line = false;
        for line in text.lines() {
            if !line.to_lowercase().contains(&self.fan_marker) {
                continue;
            }
            saw_fan_line = true;

            let Some((whole, number)) = first_reading(&self.rpm, line) else {
                continue;
            };
            let rpm = parse_number::<u32>(number.as_str())?;
            let fan = label_before(&line[..whole.start()], &[":", " at "])
                .unwrap_or_else(|| format!("fan {}", out.len()));
            out.push(FanReading { fan, rpm });
        }

        if saw_fan_line && out.is_empty() {
            return Err(ParseError::NoFanSpeed {
                marker: self.fan_marker.clone(),
            });
        }
        Ok(out)
    }
}

/// First match on `line` that is not a `name = value` annotation, as
/// (whole match, number group).
fn first_reading<'t>(
    pattern: &Regex,
    line: &'t str,
) -> Option<(regex::Match<'t>, regex::Match<'t>)> {
    pattern.captures_iter(line).find_map(|caps| {
        let whole = caps.get(0)?;
        let number = caps.get(1)?;
        if line[..whole.start()].trim_end().ends_with('=') {
            None
        } else {
            Some((whole, number))
        }
    })
}

fn parse_number<T: std::str::FromStr>(token: &str) -> Result<T, ParseError> {
    token
        .trim_start_matches('+')
        .parse::<T>()
        .map_err(|_| ParseError::InvalidNumber {
            token: token.to_string(),
        })
}

fn label_before(prefix: &str, separators: &[&str]) -> Option<String> {
    let cut = separators
        .iter()
        .filter_map(|sep| prefix.find(sep))
        .min()?;
    let label = prefix[..cut].trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}
