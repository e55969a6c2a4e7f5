//! Error types for the weather poller and the configuration relay.

use std::time::Duration;
use thiserror::Error;

/// Errors from the geolocation provider.
#[derive(Debug, Error)]
pub enum LocationError {
    /// No fix arrived within the request timeout
    #[error("Location timeout after {0:?}")]
    Timeout(Duration),

    /// Provider refused or could not produce a position
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Errors that fail a weather cycle.
///
/// Every variant ends up as the fallback payload on the watch; the
/// distinction only matters for logging.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Weather service returned status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::Parse(err.to_string())
    }
}

/// Errors from a single delivery attempt on the messaging channel.
#[derive(Debug, Error)]
pub enum SendError {
    /// The channel answered but did not accept the message
    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the configuration relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration payload is not a JSON object")]
    NotAnObject,

    #[error("Unsupported value for key '{0}': only strings, numbers and booleans are forwarded")]
    UnsupportedValue(String),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Cannot open settings page: {0}")]
    Open(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found or unreadable
    #[error("Config error: {0}")]
    Read(String),

    /// Failed to parse configuration YAML
    #[error("Parse error: {0}")]
    Parse(String),

    /// Parsed but semantically wrong
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
