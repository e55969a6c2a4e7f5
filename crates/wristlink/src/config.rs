//! Configuration loading utilities.
//!
//! Every field has a default, so running without a config file polls
//! OpenWeatherMap every 15 minutes using IP geolocation and prints the
//! watch messages to stdout.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherConfig,
    pub location: LocationConfig,
    pub send: SendConfig,
    pub channel: ChannelConfig,
    /// Page opened by `wristlink settings`
    pub settings_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Scheme and host of the OpenWeatherMap-compatible service
    pub base_url: String,
    /// Period of the repeating weather timer
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Consecutive failures after which only the timer retries
    pub max_immediate_retries: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.openweathermap.org".to_string(),
            interval_secs: 15 * 60,
            request_timeout_secs: 30,
            max_immediate_retries: 5,
        }
    }
}

impl WeatherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Look the position up from the public IP address
    #[default]
    Ip,
    /// Fixed coordinates from `latitude` / `longitude`
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub source: LocationSource,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timeout_secs: u64,
    /// A fix younger than this is reused without asking the provider
    pub maximum_age_secs: u64,
    pub lookup_url: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSource::Ip,
            latitude: None,
            longitude: None,
            timeout_secs: 15,
            maximum_age_secs: 10,
            lookup_url: "http://ip-api.com/json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub max_attempts: u32,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 5,
            max_backoff_secs: 60,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// One JSON line per message on stdout
    #[default]
    Stdout,
    /// POST each message to `url`
    Http,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub url: Option<String>,
}

impl Config {
    /// Reject values that would make the poller spin or never deliver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weather.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "weather.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.weather.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "weather.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.send.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "send.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.send.initial_backoff_secs > self.send.max_backoff_secs {
            return Err(ConfigError::Invalid(format!(
                "send.initial_backoff_secs ({}) exceeds send.max_backoff_secs ({})",
                self.send.initial_backoff_secs, self.send.max_backoff_secs
            )));
        }
        if self.channel.kind == ChannelKind::Http && self.channel.url.is_none() {
            return Err(ConfigError::Invalid(
                "channel.url is required for the http channel".to_string(),
            ));
        }
        if self.location.source == LocationSource::Static {
            match (self.location.latitude, self.location.longitude) {
                (Some(lat), Some(lon)) => {
                    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                        return Err(ConfigError::Invalid(format!(
                            "coordinates out of range: ({}, {})",
                            lat, lon
                        )));
                    }
                }
                _ => {
                    return Err(ConfigError::Invalid(
                        "static location needs both latitude and longitude".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Default config location: `<config dir>/wristlink/config.yaml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wristlink")
        .join("config.yaml")
}

/// Load configuration from a YAML file.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_config(&contents).map_err(|e| match e {
        ConfigError::Parse(msg) => {
            ConfigError::Parse(format!("Failed to parse {}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Load configuration from a file, or use default if file doesn't exist.
pub fn load_config_or_default<T: DeserializeOwned + Default>(
    path: impl AsRef<Path>,
) -> Result<T, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        log::info!("Config file not found, using defaults: {}", path.display());
        return Ok(T::default());
    }

    load_config(path)
}

/// Parse configuration from a YAML string.
///
/// Useful for testing or inline configuration.
pub fn parse_config<T: DeserializeOwned>(yaml: &str) -> Result<T, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}
