//! Geolocation providers.
//!
//! [`LocationProvider`] is the seam to whatever knows where the phone is.
//! [`CachedLocation`] wraps a provider with the request options the poller
//! uses: a hard timeout and a maximum age for reusing the last fix.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{LocationConfig, LocationSource};
use crate::error::{ConfigError, LocationError};

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub acquired_at: Instant,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            acquired_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// Source of the device position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Location, LocationError>;
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for Box<T> {
    async fn current_position(&self) -> Result<Location, LocationError> {
        (**self).current_position().await
    }
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for Arc<T> {
    async fn current_position(&self) -> Result<Location, LocationError> {
        (**self).current_position().await
    }
}

/// Fixed coordinates from the config file.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_position(&self) -> Result<Location, LocationError> {
        Ok(Location::new(self.latitude, self.longitude))
    }
}

/// Wire format of the ip-api.com JSON endpoint.
#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    city: Option<String>,
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpLocation {
    client: reqwest::Client,
    lookup_url: String,
}

impl IpLocation {
    pub fn new(lookup_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            lookup_url: lookup_url.into(),
        }
    }
}

/// Parse an ip-api.com style response body.
pub fn parse_ip_lookup(body: &str) -> Result<Location, LocationError> {
    let response: IpLookupResponse = serde_json::from_str(body)
        .map_err(|e| LocationError::Unavailable(format!("bad lookup response: {}", e)))?;

    if response.status != "success" {
        return Err(LocationError::Unavailable(
            response
                .message
                .unwrap_or_else(|| format!("lookup status '{}'", response.status)),
        ));
    }

    match (response.lat, response.lon) {
        (Some(lat), Some(lon)) => {
            if let Some(city) = &response.city {
                log::debug!("IP lookup resolved to {}", city);
            }
            Ok(Location::new(lat, lon))
        }
        _ => Err(LocationError::Unavailable(
            "lookup response has no coordinates".to_string(),
        )),
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn current_position(&self) -> Result<Location, LocationError> {
        let response = self
            .client
            .get(&self.lookup_url)
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocationError::Unavailable(format!(
                "lookup returned status {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;
        parse_ip_lookup(&body)
    }
}

/// Build the provider selected in the config.
pub fn provider_from_config(
    config: &LocationConfig,
) -> Result<Box<dyn LocationProvider>, ConfigError> {
    match config.source {
        LocationSource::Ip => Ok(Box::new(IpLocation::new(config.lookup_url.clone()))),
        LocationSource::Static => match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Box::new(StaticLocation {
                latitude,
                longitude,
            })),
            _ => Err(ConfigError::Invalid(
                "static location needs both latitude and longitude".to_string(),
            )),
        },
    }
}

/// Request options for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            maximum_age: Duration::from_secs(10),
        }
    }
}

impl From<&LocationConfig> for LocationOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            maximum_age: Duration::from_secs(config.maximum_age_secs),
        }
    }
}

/// A provider with a request timeout and a short-lived cache of the last fix.
pub struct CachedLocation<P> {
    provider: P,
    options: LocationOptions,
    last_fix: Option<Location>,
}

impl<P: LocationProvider> CachedLocation<P> {
    pub fn new(provider: P, options: LocationOptions) -> Self {
        Self {
            provider,
            options,
            last_fix: None,
        }
    }

    pub fn options(&self) -> LocationOptions {
        self.options
    }

    /// Return the last fix if it is younger than the maximum age, otherwise
    /// ask the provider, giving up after the timeout.
    pub async fn acquire(&mut self) -> Result<Location, LocationError> {
        if let Some(fix) = self.last_fix {
            if fix.age() < self.options.maximum_age {
                log::debug!("Reusing location fix from {:?} ago", fix.age());
                return Ok(fix);
            }
        }

        let fix = tokio::time::timeout(self.options.timeout, self.provider.current_position())
            .await
            .map_err(|_| LocationError::Timeout(self.options.timeout))??;

        self.last_fix = Some(fix);
        Ok(fix)
    }
}
