use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserializes a `Duration` from an integer number of milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Deserializes a `Duration` from an integer number of seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Windows {
        #[serde(deserialize_with = "deserialize_duration_from_ms")]
        backoff: Duration,
        #[serde(deserialize_with = "deserialize_duration_from_seconds")]
        cooldown: Duration,
    }

    #[test]
    fn test_deserialize_durations() {
        let parsed: Windows =
            serde_json::from_str(r#"{"backoff": 1500, "cooldown": 3600}"#).unwrap();
        assert_eq!(
            parsed,
            Windows { backoff: Duration::from_millis(1500), cooldown: Duration::from_secs(3600) }
        );
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let result: Result<Windows, _> =
            serde_json::from_str(r#"{"backoff": -1, "cooldown": 10}"#);
        assert!(result.is_err());
    }
}
