//! Watch message formats.
//!
//! The watchface reads weather updates as a five-entry dictionary keyed by
//! the strings `"0"` to `"4"`:
//!
//! | key | content                     | example    |
//! |-----|-----------------------------|------------|
//! | 0   | icon code (0-7, 8 = error)  | `3`        |
//! | 1   | temperature in Fahrenheit   | `"80.3°F"` |
//! | 2   | city name                   | `"London"` |
//! | 3   | condition summary           | `"Clear"`  |
//! | 4   | temperature in Celsius      | `"26.9°C"` |

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::weather::WeatherObservation;

/// A message on the channel to the watch.
pub type AppMessage = Map<String, Value>;

/// Icon code the watchface draws as "weather unavailable".
pub const FALLBACK_ICON: u8 = 8;

const FALLBACK_TEMPERATURE: &str = "---\u{00B0}F";
const FALLBACK_TEXT: &str = "N/A";

/// Round to `places` decimals the way the watch firmware expects.
///
/// The value is first truncated at one extra decimal and only then rounded
/// half-up, so `26.849999` becomes `26.8` rather than `26.85` rounding up.
pub fn round_to(value: f64, places: i32) -> f64 {
    let truncated = (value * 10f64.powi(places + 1)).trunc();
    (truncated / 10.0 + 0.5).floor() / 10f64.powi(places)
}

/// `1.8 * celsius + 32`
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    1.8 * celsius + 32.0
}

/// Format a temperature with one decimal and a degree suffix.
///
/// Whole values drop the fraction (`"27°C"`).
pub fn format_temperature(value: f64, unit: char) -> String {
    // `+ 0.0` turns a negative zero into "0"
    format!("{}\u{00B0}{}", round_to(value, 1) + 0.0, unit)
}

/// A weather update for the watchface.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherPayload {
    pub icon: u8,
    pub fahrenheit: String,
    pub city: String,
    pub description: String,
    pub celsius: String,
}

impl WeatherPayload {
    pub fn from_observation(observation: &WeatherObservation, icon: u8) -> Self {
        Self {
            icon,
            fahrenheit: format_temperature(celsius_to_fahrenheit(observation.celsius), 'F'),
            city: observation.city.clone(),
            description: observation.condition.clone(),
            celsius: format_temperature(observation.celsius, 'C'),
        }
    }

    /// The fixed payload sent whenever a cycle fails, whatever the cause.
    ///
    /// Key 4 carries the Fahrenheit placeholder as well; the watchface only
    /// checks the icon code.
    pub fn fallback() -> Self {
        Self {
            icon: FALLBACK_ICON,
            fahrenheit: FALLBACK_TEMPERATURE.to_string(),
            city: FALLBACK_TEXT.to_string(),
            description: FALLBACK_TEXT.to_string(),
            celsius: FALLBACK_TEMPERATURE.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.icon == FALLBACK_ICON
    }

    pub fn to_message(&self) -> AppMessage {
        let mut message = AppMessage::new();
        message.insert("0".to_string(), Value::from(self.icon));
        message.insert("1".to_string(), Value::from(self.fahrenheit.as_str()));
        message.insert("2".to_string(), Value::from(self.city.as_str()));
        message.insert("3".to_string(), Value::from(self.description.as_str()));
        message.insert("4".to_string(), Value::from(self.celsius.as_str()));
        message
    }
}

impl Serialize for WeatherPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_message().serialize(serializer)
    }
}

impl From<&WeatherPayload> for AppMessage {
    fn from(payload: &WeatherPayload) -> Self {
        payload.to_message()
    }
}
