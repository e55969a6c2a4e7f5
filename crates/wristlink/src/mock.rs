//! In-memory host capabilities for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::channel::MessageChannel;
use crate::error::{LocationError, SendError, WeatherError};
use crate::location::{Location, LocationProvider};
use crate::payload::AppMessage;
use crate::relay::UrlOpener;
use crate::weather::{WeatherObservation, WeatherSource};

pub struct MockLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl MockLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn current_position(&self) -> Result<Location, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Location::new(self.latitude, self.longitude))
    }
}

#[derive(Default)]
pub struct FailingLocation {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LocationProvider for FailingLocation {
    async fn current_position(&self) -> Result<Location, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LocationError::Unavailable("permission denied".to_string()))
    }
}

/// Returns `observation`, or a 500 status when it is `None`.
pub struct MockWeather {
    pub observation: Mutex<Option<WeatherObservation>>,
    pub calls: AtomicUsize,
}

impl MockWeather {
    pub fn new(observation: WeatherObservation) -> Self {
        Self {
            observation: Mutex::new(Some(observation)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            observation: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, observation: Option<WeatherObservation>) {
        *self.observation.lock().unwrap() = observation;
    }
}

#[async_trait]
impl WeatherSource for MockWeather {
    async fn fetch_weather(&self, _location: &Location) -> Result<WeatherObservation, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.observation
            .lock()
            .unwrap()
            .clone()
            .ok_or(WeatherError::Status(500))
    }
}

/// Records accepted messages; rejects the first `failures_left` attempts.
#[derive(Default)]
pub struct MockChannel {
    pub sent: Mutex<Vec<AppMessage>>,
    pub failures_left: AtomicU32,
    pub attempts: AtomicUsize,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<AppMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageChannel for MockChannel {
    async fn send(&self, message: &AppMessage) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(SendError::Rejected("watch not connected".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
