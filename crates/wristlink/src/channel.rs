//! Messaging channel to the watch.
//!
//! A [`MessageChannel`] makes a single delivery attempt. Retrying is the
//! caller's business: [`deliver`] retries with capped exponential backoff
//! up to a fixed number of attempts.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::{ChannelConfig, ChannelKind, SendConfig};
use crate::error::{ConfigError, SendError};
use crate::payload::AppMessage;

/// Acknowledged transport to the watch.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Resolve once the watch accepted the message, or with the reason it
    /// did not.
    async fn send(&self, message: &AppMessage) -> Result<(), SendError>;
}

#[async_trait]
impl<T: MessageChannel + ?Sized> MessageChannel for Box<T> {
    async fn send(&self, message: &AppMessage) -> Result<(), SendError> {
        (**self).send(message).await
    }
}

#[async_trait]
impl<T: MessageChannel + ?Sized> MessageChannel for Arc<T> {
    async fn send(&self, message: &AppMessage) -> Result<(), SendError> {
        (**self).send(message).await
    }
}

// ── Retry ───────────────────────────────────────────────────────────

/// Backoff schedule for redelivering a rejected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Total attempts including the first one
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SendConfig::default())
    }
}

impl From<&SendConfig> for RetryPolicy {
    fn from(config: &SendConfig) -> Self {
        Self {
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempts`-th failure (1-based).
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Send `message`, retrying rejected attempts according to `policy`.
///
/// Returns the number of attempts used, or the last error once the policy
/// is exhausted.
pub async fn deliver<C: MessageChannel + ?Sized>(
    channel: &C,
    message: &AppMessage,
    policy: &RetryPolicy,
) -> Result<u32, SendError> {
    match channel.send(message).await {
        Ok(()) => {
            log::info!("Successfully sent message (attempt 1)");
            Ok(1)
        }
        Err(e) => retry(channel, message, policy, e).await,
    }
}

/// Keep redelivering `message` after its first attempt failed with `error`.
///
/// Attempt numbering continues from that first attempt, so the returned
/// count and the `max_attempts` limit match [`deliver`].
pub async fn retry<C: MessageChannel + ?Sized>(
    channel: &C,
    message: &AppMessage,
    policy: &RetryPolicy,
    error: SendError,
) -> Result<u32, SendError> {
    let mut attempt = 1;
    let mut last_error = error;
    loop {
        if attempt >= policy.max_attempts {
            return Err(last_error);
        }
        let delay = policy.backoff(attempt);
        log::warn!(
            "Unable to send message: {}; retrying in {:?}",
            last_error,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;

        match channel.send(message).await {
            Ok(()) => {
                log::info!("Successfully sent message (attempt {})", attempt);
                return Ok(attempt);
            }
            Err(e) => last_error = e,
        }
    }
}

// ── Channels ────────────────────────────────────────────────────────

/// Writes each message as one JSON line on stdout, for piping into a
/// bridge process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutChannel;

#[async_trait]
impl MessageChannel for StdoutChannel {
    async fn send(&self, message: &AppMessage) -> Result<(), SendError> {
        let mut line = serde_json::to_vec(message)
            .map_err(|e| SendError::Rejected(format!("cannot encode message: {}", e)))?;
        line.push(b'\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// POSTs each message as a JSON object to a bridge endpoint.
///
/// Any non-2xx answer counts as a rejected delivery.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    url: Url,
}

impl HttpChannel {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|e| ConfigError::Invalid(format!("channel.url: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl MessageChannel for HttpChannel {
    async fn send(&self, message: &AppMessage) -> Result<(), SendError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected(format!(
                "bridge answered {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }
}

/// Build the channel selected in the config.
pub fn channel_from_config(config: &ChannelConfig) -> Result<Box<dyn MessageChannel>, ConfigError> {
    match config.kind {
        ChannelKind::Stdout => Ok(Box::new(StdoutChannel)),
        ChannelKind::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                ConfigError::Invalid("channel.url is required for the http channel".to_string())
            })?;
            Ok(Box::new(HttpChannel::new(url)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChannel;
    use serde_json::json;

    fn message() -> AppMessage {
        match json!({"0": 3, "1": "68°F"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(5));
        assert_eq!(policy.backoff(2), Duration::from_secs(10));
        assert_eq!(policy.backoff(3), Duration::from_secs(20));
        assert_eq!(policy.backoff(4), Duration::from_secs(40));
        assert_eq!(policy.backoff(5), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        let config = SendConfig {
            max_attempts: 0,
            ..SendConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deliver_retries_until_accepted() {
        let channel = MockChannel::failing_first(2);
        let start = tokio::time::Instant::now();

        let attempts = deliver(&channel, &message(), &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(channel.messages().len(), 1);
        // 5s after the first failure, 10s after the second
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn deliver_gives_up_after_max_attempts() {
        let channel = MockChannel::failing_first(u32::MAX);
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };

        let result = deliver(&channel, &message(), &policy).await;

        assert!(matches!(result, Err(SendError::Rejected(_))));
        assert_eq!(channel.attempts(), 3);
        assert!(channel.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_continues_after_failed_first_attempt() {
        let channel = MockChannel::failing_first(1);
        let start = tokio::time::Instant::now();
        let first = SendError::Rejected("watch not connected".to_string());

        let attempts = retry(&channel, &message(), &RetryPolicy::default(), first)
            .await
            .unwrap();

        // The caller's attempt counts as the first
        assert_eq!(attempts, 3);
        assert_eq!(channel.attempts(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_with_single_attempt_policy_returns_first_error() {
        let channel = MockChannel::new();
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let first = SendError::Rejected("busy".to_string());

        let result = retry(&channel, &message(), &policy, first).await;

        assert!(matches!(result, Err(SendError::Rejected(m)) if m == "busy"));
        assert_eq!(channel.attempts(), 0);
    }

    #[test]
    fn http_channel_requires_url() {
        let config = ChannelConfig {
            kind: ChannelKind::Http,
            url: None,
        };
        assert!(channel_from_config(&config).is_err());

        let config = ChannelConfig {
            kind: ChannelKind::Http,
            url: Some("http://127.0.0.1:8080/appmessage".to_string()),
        };
        assert!(channel_from_config(&config).is_ok());
    }
}
