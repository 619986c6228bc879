//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Parse a duration from either plain seconds (`"30"`, `"0.5"`) or a human
/// readable string (`"5m"`, `"1500ms"`, `"2h 30m"`).
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("duration must be a non-negative number, got {}", value));
        }
        return Ok(Duration::from_secs_f64(seconds));
    }
    humantime::parse_duration(value).map_err(|e| format!("invalid duration '{}': {}", value, e))
}

/// Serde helper module for Duration: accepts seconds or human strings,
/// serializes as a human string.
pub mod serde_duration {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(f64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                Ok(Duration::from_secs_f64(seconds))
            }
            RawDuration::Seconds(seconds) => Err(serde::de::Error::custom(format!(
                "duration must be a non-negative number, got {}",
                seconds
            ))),
            RawDuration::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// Default functions for serde
pub fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_duration")]
        value: Duration,
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1500ms").unwrap(), Duration::from_millis(1500));
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_serde_duration_accepts_numbers_and_strings() {
        let from_number: Wrapper = serde_yaml::from_str("value: 45").unwrap();
        assert_eq!(from_number.value, Duration::from_secs(45));

        let from_text: Wrapper = serde_yaml::from_str("value: 2m").unwrap();
        assert_eq!(from_text.value, Duration::from_secs(120));

        let rendered = serde_yaml::to_string(&from_text).unwrap();
        assert!(rendered.contains("2m"));
    }
}
