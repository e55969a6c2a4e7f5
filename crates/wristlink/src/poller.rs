//! Weather poller.
//!
//! Runs one cycle (location → weather → watch) immediately on start and then
//! on a repeating `interval` timer. A failed cycle sends the fallback payload
//! and re-arms the timer; the next cycle runs right away until
//! `max_immediate_retries` consecutive cycles have failed, after which only
//! the timer retries.
//!
//! All cycles run in the single task that owns the poller and never
//! overlap. Each cycle makes one delivery attempt inline; redelivery of a
//! rejected message runs in the background and is cancelled when the next
//! cycle starts, so a disconnected watch never holds up the timer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::{retry, MessageChannel, RetryPolicy};
use crate::config::Config;
use crate::error::WeatherError;
use crate::icon::map_icon_code;
use crate::location::{CachedLocation, Location, LocationOptions, LocationProvider};
use crate::payload::WeatherPayload;
use crate::weather::{WeatherObservation, WeatherSource};

/// Timings of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub max_immediate_retries: u32,
    pub location: LocationOptions,
    pub send: RetryPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.weather.interval(),
            max_immediate_retries: config.weather.max_immediate_retries,
            location: LocationOptions::from(&config.location),
            send: RetryPolicy::from(&config.send),
        }
    }
}

/// Periodic weather updates for the watch.
pub struct WeatherPoller<L, W, C> {
    location: CachedLocation<L>,
    weather: W,
    channel: Arc<C>,
    settings: PollerSettings,
    failures: u32,
    redelivery: Option<JoinHandle<()>>,
}

impl<L, W, C> WeatherPoller<L, W, C>
where
    L: LocationProvider,
    W: WeatherSource,
    C: MessageChannel + 'static,
{
    pub fn new(location: L, weather: W, channel: C, settings: PollerSettings) -> Self {
        Self {
            location: CachedLocation::new(location, settings.location),
            weather,
            channel: Arc::new(channel),
            settings,
            failures: 0,
            redelivery: None,
        }
    }

    /// Consecutive failed cycles.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub async fn acquire_location(&mut self) -> Result<Location, WeatherError> {
        Ok(self.location.acquire().await?)
    }

    pub async fn fetch_weather(
        &self,
        location: &Location,
    ) -> Result<WeatherObservation, WeatherError> {
        self.weather.fetch_weather(location).await
    }

    /// Deliver a payload. The first attempt is awaited; if the watch
    /// rejects it, redelivery per the send policy continues in the
    /// background until it succeeds, runs out of attempts or the next cycle
    /// starts. Delivery failures never fail the cycle.
    pub async fn send(&mut self, payload: &WeatherPayload) {
        let message = payload.to_message();
        let error = match self.channel.send(&message).await {
            Ok(()) => {
                log::info!("Successfully sent message");
                return;
            }
            Err(e) => e,
        };

        let channel = Arc::clone(&self.channel);
        let policy = self.settings.send;
        self.redelivery = Some(tokio::spawn(async move {
            if let Err(e) = retry(&*channel, &message, &policy, error).await {
                log::error!(
                    "Dropping weather message after {} attempts: {}",
                    policy.max_attempts,
                    e
                );
            }
        }));
    }

    /// Whether a rejected message is still being redelivered.
    pub fn is_redelivering(&self) -> bool {
        self.redelivery
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn cancel_redelivery(&mut self) {
        if let Some(task) = self.redelivery.take() {
            if !task.is_finished() {
                log::warn!("Abandoning redelivery of the previous weather message");
            }
            task.abort();
        }
    }

    /// One location → weather → send attempt.
    ///
    /// Cancels any redelivery left over from the previous cycle. On failure
    /// the fallback payload has already been offered to the watch when this
    /// returns.
    pub async fn cycle(&mut self) -> Result<(), WeatherError> {
        self.cancel_redelivery();
        log::info!("Requesting weather...");
        match self.build_payload().await {
            Ok(payload) => {
                self.failures = 0;
                self.send(&payload).await;
                Ok(())
            }
            Err(e) => {
                log::warn!("Unable to retrieve weather: {}", e);
                self.send(&WeatherPayload::fallback()).await;
                Err(e)
            }
        }
    }

    async fn build_payload(&mut self) -> Result<WeatherPayload, WeatherError> {
        let location = self.acquire_location().await?;
        log::info!(
            "Location received ({}, {}), fetching weather",
            location.latitude,
            location.longitude
        );

        let observation = self.fetch_weather(&location).await?;
        log::info!("Weather received for {}, sending to watch", observation.city);

        let icon = map_icon_code(
            observation.condition_code,
            observation.sunset,
            observation.sunrise,
        );
        Ok(WeatherPayload::from_observation(&observation, icon))
    }

    /// Count a failed cycle and return the delay before the next one. The
    /// repeating timer is re-armed from now with this delay.
    pub fn reset(&mut self) -> Duration {
        self.failures += 1;
        if self.failures < self.settings.max_immediate_retries {
            log::info!("Retrying weather immediately (failure {})", self.failures);
            Duration::ZERO
        } else {
            log::warn!(
                "{} consecutive weather failures, next attempt in {:?}",
                self.failures,
                self.settings.interval
            );
            self.settings.interval
        }
    }

    /// Poll until the shutdown signal fires. An in-flight cycle and any
    /// pending redelivery are dropped on shutdown.
    ///
    /// `settings.interval` must be non-zero.
    pub async fn run(mut self, mut shutdown: watch::Receiver<()>) {
        log::info!(
            "Initial weather request, then every {:?}",
            self.settings.interval
        );
        // First tick fires immediately: the startup cycle.
        let mut timer = tokio::time::interval(self.settings.interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = timer.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                outcome = self.cycle() => outcome,
            };

            if outcome.is_err() {
                let delay = self.reset();
                timer.reset_after(delay);
            }
        }

        log::info!("Weather poller stopped");
    }
}

impl<L, W, C> Drop for WeatherPoller<L, W, C> {
    fn drop(&mut self) {
        if let Some(task) = self.redelivery.take() {
            task.abort();
        }
    }
}
