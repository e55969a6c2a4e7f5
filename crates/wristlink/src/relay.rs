//! Settings page relay.
//!
//! The settings page closes with a percent-encoded JSON object. The relay
//! decodes it, checks it is a flat object of primitives and forwards it to
//! the watch as-is. The watch owns the meaning of the keys.

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::channel::MessageChannel;
use crate::error::RelayError;
use crate::payload::AppMessage;

/// Host capability for showing a web page to the user.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens pages in the system browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// Decode a webview close response into a configuration message.
///
/// `+` is kept literally, and a `%` not followed by two hex digits is an
/// error rather than passed through.
pub fn decode_configuration(response: &str) -> Result<AppMessage, RelayError> {
    check_escapes(response)?;
    let decoded = percent_decode_str(response)
        .decode_utf8()
        .map_err(|e| RelayError::Decode(e.to_string()))?;

    let Value::Object(map) = serde_json::from_str::<Value>(&decoded)? else {
        return Err(RelayError::NotAnObject);
    };

    if let Some((key, _)) = map
        .iter()
        .find(|(_, value)| !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)))
    {
        return Err(RelayError::UnsupportedValue(key.clone()));
    }

    Ok(map)
}

fn check_escapes(input: &str) -> Result<(), RelayError> {
    let bytes = input.as_bytes();
    for (i, _) in bytes.iter().enumerate().filter(|(_, b)| **b == b'%') {
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(RelayError::Decode(format!(
                "malformed escape at offset {}",
                i
            )));
        }
    }
    Ok(())
}

/// Forwards settings page results to the watch.
pub struct ConfigRelay<C> {
    channel: C,
    settings_url: Option<String>,
}

impl<C: MessageChannel> ConfigRelay<C> {
    pub fn new(channel: C, settings_url: Option<String>) -> Self {
        Self {
            channel,
            settings_url,
        }
    }

    /// Open the settings page.
    pub fn show_configuration(&self, opener: &dyn UrlOpener) -> Result<(), RelayError> {
        let url = self
            .settings_url
            .as_deref()
            .ok_or_else(|| RelayError::Open("settings_url is not configured".to_string()))?;
        log::info!("Showing configuration page: {}", url);
        opener
            .open(url)
            .map_err(|e| RelayError::Open(format!("{}: {}", url, e)))
    }

    /// Handle the webview close event.
    ///
    /// An empty response (page dismissed) sends nothing and returns
    /// `Ok(None)`. Otherwise the decoded message is sent once, without
    /// retry, and returned.
    pub async fn on_webview_closed(&self, response: &str) -> Result<Option<AppMessage>, RelayError> {
        if response.is_empty() {
            log::debug!("Configuration closed without a response");
            return Ok(None);
        }

        let message = decode_configuration(response).inspect_err(|e| {
            log::error!("Rejecting configuration payload: {}", e);
        })?;

        log::info!("Forwarding configuration ({} keys)", message.len());
        self.channel.send(&message).await?;
        Ok(Some(message))
    }
}
