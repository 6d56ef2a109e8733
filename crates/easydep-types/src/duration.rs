//! Duration (de)serialization that accepts either a humantime string
//! (`"10s"`, `"2m"`) or a plain integer number of milliseconds, and
//! always serializes back out as milliseconds.

use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::Deserialize;

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DurationForm {
        Millis(u64),
        Human(String),
    }

    match DurationForm::deserialize(deserializer)? {
        DurationForm::Millis(ms) => Ok(Duration::from_millis(ms)),
        DurationForm::Human(s) => humantime::parse_duration(&s).map_err(de::Error::custom),
    }
}

pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub fn deserialize_duration_opt<'de, D>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DurationOptForm {
        None(Option<()>),
        Millis(u64),
        Human(String),
    }

    match Option::<DurationOptForm>::deserialize(deserializer)? {
        None | Some(DurationOptForm::None(_)) => Ok(None),
        Some(DurationOptForm::Millis(ms)) => Ok(Some(Duration::from_millis(ms))),
        Some(DurationOptForm::Human(s)) => {
            humantime::parse_duration(&s).map(Some).map_err(de::Error::custom)
        }
    }
}

/// Floor a duration at `min`, returning `min` if `value` is smaller.
pub fn floor(value: Duration, min: Duration) -> Duration {
    if value < min {
        min
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(
            deserialize_with = "deserialize_duration",
            serialize_with = "serialize_duration"
        )]
        value: Duration,
    }

    #[test]
    fn parses_humantime_string() {
        let w: Wrapper = serde_json::from_str(r#"{"value":"10s"}"#).unwrap();
        assert_eq!(w.value, Duration::from_secs(10));
    }

    #[test]
    fn parses_millis_integer() {
        let w: Wrapper = serde_json::from_str(r#"{"value":1500}"#).unwrap();
        assert_eq!(w.value, Duration::from_millis(1500));
    }

    #[test]
    fn serializes_as_millis() {
        let w = Wrapper {
            value: Duration::from_secs(2),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"value":2000}"#);
    }

    #[test]
    fn floor_raises_small_values() {
        assert_eq!(
            floor(Duration::from_millis(10), Duration::from_millis(100)),
            Duration::from_millis(100)
        );
        assert_eq!(
            floor(Duration::from_millis(200), Duration::from_millis(100)),
            Duration::from_millis(200)
        );
    }
}
