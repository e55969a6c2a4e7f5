//! wristlink: phone-side companion for a wearable watchface.
//!
//! Two independent pieces:
//!
//! - [`poller::WeatherPoller`] locates the phone, fetches the current
//!   weather and pushes a five-field message to the watch every 15 minutes,
//!   falling back to an error payload and quick retries when a cycle fails.
//! - [`relay::ConfigRelay`] forwards the result of the settings page to the
//!   watch.
//!
//! Host capabilities (position, watch channel, browser) sit behind the
//! [`location::LocationProvider`], [`channel::MessageChannel`] and
//! [`relay::UrlOpener`] traits.

pub mod channel;
pub mod config;
pub mod error;
pub mod icon;
pub mod location;
pub mod payload;
pub mod poller;
pub mod relay;
pub mod runner;
pub mod weather;

#[cfg(test)]
mod mock;

pub use channel::{deliver, MessageChannel, RetryPolicy};
pub use config::Config;
pub use error::{ConfigError, LocationError, RelayError, SendError, WeatherError};
pub use payload::{AppMessage, WeatherPayload};
pub use poller::{PollerSettings, WeatherPoller};
pub use relay::ConfigRelay;
