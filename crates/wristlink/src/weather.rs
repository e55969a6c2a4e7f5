//! OpenWeatherMap current-weather client.
//!
//! Issues a single unauthenticated `GET <base>/data/2.5/weather?lat=..&lon=..`
//! per cycle with coordinates rounded to two decimals.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::config::WeatherConfig;
use crate::error::{ConfigError, WeatherError};
use crate::location::Location;
use crate::payload::round_to;

// ── Constants ───────────────────────────────────────────────────────

const WEATHER_PATH: &str = "data/2.5/weather";

const KELVIN_OFFSET: f64 = 273.15;

// ── Observation ─────────────────────────────────────────────────────

/// The parts of a weather response the watchface needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub celsius: f64,
    pub condition_code: i64,
    /// Short condition group, e.g. "Clouds"
    pub condition: String,
    pub city: String,
    pub sunrise: i64,
    pub sunset: i64,
}

/// Source of weather observations for a position.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, location: &Location) -> Result<WeatherObservation, WeatherError>;
}

#[async_trait]
impl<T: WeatherSource + ?Sized> WeatherSource for Box<T> {
    async fn fetch_weather(&self, location: &Location) -> Result<WeatherObservation, WeatherError> {
        (**self).fetch_weather(location).await
    }
}

#[async_trait]
impl<T: WeatherSource + ?Sized> WeatherSource for Arc<T> {
    async fn fetch_weather(&self, location: &Location) -> Result<WeatherObservation, WeatherError> {
        (**self).fetch_weather(location).await
    }
}

// ── API response ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    main: Option<MainBlock>,
    weather: Option<Vec<ConditionBlock>>,
    sys: Option<SysBlock>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    /// Kelvin
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    id: i64,
    main: String,
}

#[derive(Debug, Deserialize)]
struct SysBlock {
    sunrise: i64,
    sunset: i64,
}

/// Parse a current-weather response body.
///
/// Malformed JSON and responses missing any of `main`, `weather[0]`, `sys`
/// or `name` are rejected.
pub fn parse_observation(body: &str) -> Result<WeatherObservation, WeatherError> {
    let response: ApiResponse = serde_json::from_str(body)?;

    let main = response
        .main
        .ok_or_else(|| WeatherError::Parse("response has no 'main' block".to_string()))?;
    let condition = response
        .weather
        .and_then(|w| w.into_iter().next())
        .ok_or_else(|| WeatherError::Parse("response has no weather condition".to_string()))?;
    let sys = response
        .sys
        .ok_or_else(|| WeatherError::Parse("response has no 'sys' block".to_string()))?;
    let city = response
        .name
        .ok_or_else(|| WeatherError::Parse("response has no city name".to_string()))?;

    Ok(WeatherObservation {
        celsius: main.temp - KELVIN_OFFSET,
        condition_code: condition.id,
        condition: condition.main,
        city,
        sunrise: sys.sunrise,
        sunset: sys.sunset,
    })
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for the weather service.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, ConfigError> {
        let endpoint = endpoint_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Request URL for a position.
    pub fn request_url(&self, location: &Location) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("lat", &round_to(location.latitude, 2).to_string())
            .append_pair("lon", &round_to(location.longitude, 2).to_string());
        url
    }
}

fn endpoint_url(base_url: &str) -> Result<Url, ConfigError> {
    let invalid = |e: url::ParseError| ConfigError::Invalid(format!("weather.base_url: {}", e));

    let mut base = Url::parse(base_url).map_err(invalid)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(WEATHER_PATH).map_err(invalid)
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch_weather(&self, location: &Location) -> Result<WeatherObservation, WeatherError> {
        let url = self.request_url(location);
        log::info!("Requesting weather at: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            log::warn!("Weather service did not return 200: {}", status.as_u16());
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_observation(&body).inspect_err(|e| {
            log::warn!("Unable to parse weather response: {}", e);
        })
    }
}
