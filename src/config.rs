use lettre::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub smtp_host: String,
    pub smtp_port: String,
    pub from_email: String,
    pub email_password: String,
    pub to_email: String,
    #[serde(default)]
    pub collect: CollectConfig,
}

/// Where readings come from. Thresholds are deliberately not part of the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectConfig {
    #[serde(default = "default_temperature_command")]
    pub temperature_command: Vec<String>,
    #[serde(default = "default_fan_command")]
    pub fan_command: Vec<String>,
    #[serde(default = "default_fan_marker")]
    pub fan_marker: String,
    #[serde(default = "default_disk_mount")]
    pub disk_mount: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout: String,
    #[serde(default = "default_cpu_sample_interval")]
    pub cpu_sample_interval: String,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            temperature_command: default_temperature_command(),
            fan_command: default_fan_command(),
            fan_marker: default_fan_marker(),
            disk_mount: default_disk_mount(),
            command_timeout: default_command_timeout(),
            cpu_sample_interval: default_cpu_sample_interval(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse JSON in {path}: {source}")]
    ParseJson {
        path: String,
        source: serde_json::Error,
    },
    #[error("could not parse YAML in {path}: {source}")]
    ParseYaml {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = if is_yaml_path(path_ref) {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::ParseYaml {
                path: path_display,
                source,
            })?
        } else {
            serde_json::from_str(&text).map_err(|source| ConfigError::ParseJson {
                path: path_display,
                source,
            })?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp_host.trim().is_empty() {
            return Err(ConfigError::Validation("smtp_host is required".to_string()));
        }
        self.port()?;
        validate_address("from_email", &self.from_email)?;
        validate_address("to_email", &self.to_email)?;
        validate_collect(&self.collect)?;
        Ok(())
    }

    pub fn port(&self) -> Result<u16, ConfigError> {
        match self.smtp_port.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ConfigError::Validation(format!(
                "smtp_port must be a number in 1..65535, got '{}'",
                self.smtp_port
            ))),
        }
    }

    pub fn example_json() -> &'static str {
        include_str!("../config.json.example")
    }
}

impl CollectConfig {
    pub fn command_timeout(&self) -> Result<Duration, ConfigError> {
        parse_positive_duration("collect.command_timeout", &self.command_timeout)
    }

    pub fn cpu_sample_interval(&self) -> Result<Duration, ConfigError> {
        parse_positive_duration("collect.cpu_sample_interval", &self.cpu_sample_interval)
    }
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn validate_address(field: &str, value: &str) -> Result<(), ConfigError> {
    value
        .trim()
        .parse::<Address>()
        .map(|_| ())
        .map_err(|err| {
            ConfigError::Validation(format!("{field} '{value}' is not a valid address: {err}"))
        })
}

fn validate_collect(cfg: &CollectConfig) -> Result<(), ConfigError> {
    if cfg.temperature_command.first().map_or(true, |p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "collect.temperature_command must name a program".to_string(),
        ));
    }
    if cfg.fan_command.first().map_or(true, |p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "collect.fan_command must name a program".to_string(),
        ));
    }
    if cfg.fan_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "collect.fan_marker must not be empty".to_string(),
        ));
    }
    if cfg.disk_mount.trim().is_empty() {
        return Err(ConfigError::Validation(
            "collect.disk_mount must not be empty".to_string(),
        ));
    }
    cfg.command_timeout()?;
    cfg.cpu_sample_interval()?;
    Ok(())
}

fn parse_positive_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|err| ConfigError::Validation(format!("{field} '{value}': {err}")))?;
    if duration.is_zero() {
        return Err(ConfigError::Validation(format!("{field} must be > 0")));
    }
    Ok(duration)
}

fn default_temperature_command() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["osx-cpu-temp".to_string()]
    } else {
        vec!["sensors".to_string()]
    }
}

fn default_fan_command() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["osx-cpu-temp".to_string(), "-f".to_string()]
    } else {
        vec!["sensors".to_string()]
    }
}

fn default_fan_marker() -> String {
    "fan".to_string()
}

fn default_disk_mount() -> String {
    if cfg!(target_os = "windows") {
        "C:\\".to_string()
    } else {
        "/".to_string()
    }
}

fn default_command_timeout() -> String {
    "10s".to_string()
}

fn default_cpu_sample_interval() -> String {
    "500ms".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> Config {
        Config {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: "587".to_string(),
            from_email: "monitor@example.com".to_string(),
            email_password: "hunter2".to_string(),
            to_email: "ops@example.com".to_string(),
            collect: CollectConfig::default(),
        }
    }

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let cfg = valid_config();
        let text = serde_json::to_string_pretty(&cfg).expect("serialize");
        let file = write_temp(".json", &text);

        let loaded = Config::load_from_file(file.path()).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn yaml_round_trip_preserves_fields() {
        let cfg = valid_config();
        let text = serde_yaml::to_string(&cfg).expect("serialize");
        let file = write_temp(".yaml", &text);

        let loaded = Config::load_from_file(file.path()).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn minimal_record_gets_collect_defaults() {
        let file = write_temp(
            ".json",
            r#"{
                "smtp_host": "smtp.example.com",
                "smtp_port": "587",
                "from_email": "monitor@example.com",
                "email_password": "secret",
                "to_email": "ops@example.com"
            }"#,
        );

        let loaded = Config::load_from_file(file.path()).expect("load");
        assert_eq!(loaded.collect, CollectConfig::default());
        assert_eq!(loaded.port().expect("port"), 587);
        assert_eq!(
            loaded.collect.command_timeout().expect("timeout"),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load_from_file("/definitely/not/here/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let file = write_temp(".json", "{ \"smtp_host\": ");
        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn missing_field_is_parse_error() {
        let file = write_temp(".json", r#"{ "smtp_host": "smtp.example.com" }"#);
        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn rejects_bad_port() {
        let mut cfg = valid_config();
        cfg.smtp_port = "smtp".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        cfg.smtp_port = "0".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_bad_address() {
        let mut cfg = valid_config();
        cfg.to_email = "not-an-email".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_zero_and_garbage_durations() {
        let mut cfg = valid_config();
        cfg.collect.command_timeout = "0s".to_string();
        assert!(cfg.validate().is_err());

        cfg.collect.command_timeout = "soon".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_command() {
        let mut cfg = valid_config();
        cfg.collect.fan_command = vec![];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn example_file_is_valid() {
        let cfg: Config = serde_json::from_str(Config::example_json()).expect("example parses");
        cfg.validate().expect("example validates");
    }
}
