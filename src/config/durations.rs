use std::time::Duration;

use humantime::parse_duration;
use serde::Deserialize;
use serde_with::DeserializeAs;

/// `serde_with` adapter for durations written as `"5s"` or `"1m 30s"`.
///
/// A bare number counts as seconds, so `ARBITER_GATEWAY__QUEUE__ENQUEUE_TIMEOUT=5`
/// works even though the environment source parses it as an integer.
pub(crate) struct HumantimeDuration;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(raw) => {
                let raw = raw.trim();
                match raw.parse::<u64>() {
                    Ok(secs) => Ok(Duration::from_secs(secs)),
                    Err(_) => parse_duration(raw).map_err(serde::de::Error::custom),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::HumantimeDuration;
    use serde::Deserialize;
    use serde_with::serde_as;
    use std::time::Duration;

    #[serde_as]
    #[derive(Debug, Deserialize)]
    struct Grace {
        #[serde_as(as = "HumantimeDuration")]
        grace: Duration,
    }

    fn grace(json: &str) -> Result<Duration, serde_json::Error> {
        serde_json::from_str::<Grace>(json).map(|g| g.grace)
    }

    #[test]
    fn accepts_human_text_and_bare_seconds() {
        assert_eq!(grace(r#"{"grace":"1m 30s"}"#).unwrap(), Duration::from_secs(90));
        assert_eq!(grace(r#"{"grace":" 250ms "}"#).unwrap(), Duration::from_millis(250));
        assert_eq!(grace(r#"{"grace":5}"#).unwrap(), Duration::from_secs(5));
        assert_eq!(grace(r#"{"grace":"7"}"#).unwrap(), Duration::from_secs(7));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(grace(r#"{"grace":"5 fortnights"}"#).is_err());
        assert!(grace(r#"{"grace":-1}"#).is_err());
    }
}
