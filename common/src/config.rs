use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Frame source kind, e.g. "test-pattern".
    #[serde(default = "default_source")]
    pub source: String,
    /// Seconds between captures. Must be at least 1.
    pub interval_secs: u64,
    /// Local directory, or `host:port` of a remote collector.
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Route name the camera is served under, e.g. `/stream`.
    #[serde(default = "default_route")]
    pub route: String,
    #[serde(default = "default_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weather_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            route: default_route(),
            jpeg_quality: default_quality(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lat: 0.0,
            lon: 0.0,
            api_key: String::new(),
            url: default_weather_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that must never reach a running loop.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.capture.source.is_empty() {
            return Err(ConfigError::MissingSource);
        }
        if self.stream.jpeg_quality == 0 || self.stream.jpeg_quality > 100 {
            return Err(ConfigError::InvalidQuality(self.stream.jpeg_quality));
        }
        Ok(())
    }
}

/// Where captured frames go: a directory on disk or a remote collector.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    Directory(PathBuf),
    /// `host:port` of the upload endpoint.
    Remote(String),
}

impl OutputTarget {
    /// A value that parses as a socket address is a remote collector;
    /// anything else is a local path.
    pub fn parse(raw: &str) -> Self {
        if raw.parse::<SocketAddr>().is_ok() {
            OutputTarget::Remote(raw.to_string())
        } else {
            OutputTarget::Directory(PathBuf::from(raw))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("capture interval must be a positive number of seconds")]
    InvalidInterval,
    #[error("capture source must not be empty")]
    MissingSource,
    #[error("jpeg quality must be 1-100, got {0}")]
    InvalidQuality(u8),
}

// Default value functions
fn default_source() -> String {
    "test-pattern".into()
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_route() -> String {
    "stream".into()
}
fn default_quality() -> u8 {
    80
}
fn default_weather_url() -> String {
    "http://api.openweathermap.org/data/2.5/weather".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn minimal_config_with_defaults() {
        let config = parse(
            r#"
            [capture]
            interval_secs = 60
            output = "images"
            "#,
        )
        .unwrap();
        assert_eq!(config.capture.source, "test-pattern");
        assert_eq!(config.stream.port, 8080);
        assert_eq!(config.stream.route, "stream");
        assert_eq!(config.stream.jpeg_quality, 80);
        assert_eq!(config.logging.level, "info");
        assert!(!config.weather.enabled);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = parse(
            r#"
            [capture]
            interval_secs = 0
            output = "images"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval));
    }

    #[test]
    fn quality_out_of_range_rejected() {
        let err = parse(
            r#"
            [capture]
            interval_secs = 10
            output = "images"
            [stream]
            jpeg_quality = 101
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuality(101)));
    }

    #[test]
    fn output_target_dispatch() {
        assert_eq!(
            OutputTarget::parse("192.168.1.20:8082"),
            OutputTarget::Remote("192.168.1.20:8082".to_string())
        );
        assert_eq!(
            OutputTarget::parse("/var/spool/timelapse"),
            OutputTarget::Directory(PathBuf::from("/var/spool/timelapse"))
        );
        // A bare hostname without a port is a path, not a collector.
        assert_eq!(
            OutputTarget::parse("images"),
            OutputTarget::Directory(PathBuf::from("images"))
        );
    }
}
