//! Wiring for the `wristlink` binary: logging, shutdown, and building the
//! poller and relay from a [`Config`].

use tokio::sync::watch;

use crate::channel::{channel_from_config, MessageChannel};
use crate::config::{load_config_or_default, Config};
use crate::error::ConfigError;
use crate::location::{provider_from_config, LocationProvider};
use crate::poller::{PollerSettings, WeatherPoller};
use crate::relay::ConfigRelay;
use crate::weather::WeatherClient;

/// Poller over the host implementations selected in the config.
pub type HostPoller =
    WeatherPoller<Box<dyn LocationProvider>, WeatherClient, Box<dyn MessageChannel>>;

/// Initialize logging with env_logger.
///
/// Respects RUST_LOG environment variable. Defaults to "info" level.
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Set up a shutdown channel triggered by Ctrl+C / SIGTERM.
pub fn setup_shutdown() -> Result<(watch::Sender<()>, watch::Receiver<()>), ctrlc::Error> {
    let (tx, rx) = watch::channel(());
    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    })?;
    Ok((tx, rx))
}

/// Load and validate the config, falling back to defaults when the file
/// does not exist.
pub fn load(path: &std::path::Path) -> Result<Config, ConfigError> {
    log::info!("Loading config from: {}", path.display());
    let config: Config = load_config_or_default(path)?;
    config.validate()?;
    Ok(config)
}

pub fn build_poller(config: &Config) -> Result<HostPoller, ConfigError> {
    let location = provider_from_config(&config.location)?;
    let weather = WeatherClient::new(&config.weather)?;
    let channel = channel_from_config(&config.channel)?;
    Ok(WeatherPoller::new(
        location,
        weather,
        channel,
        PollerSettings::from(config),
    ))
}

pub fn build_relay(config: &Config) -> Result<ConfigRelay<Box<dyn MessageChannel>>, ConfigError> {
    let channel = channel_from_config(&config.channel)?;
    Ok(ConfigRelay::new(channel, config.settings_url.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelKind, LocationSource};

    #[test]
    fn default_config_builds_poller_and_relay() {
        let config = Config::default();
        assert!(build_poller(&config).is_ok());
        assert!(build_relay(&config).is_ok());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "channel:\n  kind: http\n").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn static_http_config_builds() {
        let mut config = Config::default();
        config.location.source = LocationSource::Static;
        config.location.latitude = Some(48.85);
        config.location.longitude = Some(2.35);
        config.channel.kind = ChannelKind::Http;
        config.channel.url = Some("http://127.0.0.1:9000/msg".to_string());
        assert!(build_poller(&config).is_ok());
    }
}
