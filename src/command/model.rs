use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Deserialize;
use serde_with::{DeserializeAs, serde_as};

use crate::types::Action;

/// Parallel lists as posted to `/push_check_result`.
///
/// `host_names` and `return_codes` must have the same length. The other
/// lists may be shorter; missing entries count as absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CheckResultBatch {
    pub time_stamps: Vec<Option<i64>>,
    pub host_names: Vec<String>,
    pub service_descriptions: Vec<Option<String>>,
    pub return_codes: Vec<i64>,
    pub outputs: Vec<Option<String>>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct PerfdataCheck {
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub service_description: Option<String>,
    #[serde(default)]
    pub perfdata: Option<String>,
    #[serde_as(as = "Option<LenientInt>")]
    pub time: Option<i64>,
}

/// One entry of the JSON check-result endpoint. Entries carrying a
/// `return_code` are check results, the rest are perfdata pushes.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct JsonCheck {
    #[serde_as(as = "Option<LenientInt>")]
    pub time_stamp: Option<i64>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub service_description: Option<String>,
    #[serde_as(as = "Option<LenientInt>")]
    pub return_code: Option<i64>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub perfdata: Option<String>,
    #[serde_as(as = "Option<LenientInt>")]
    pub time: Option<i64>,
}

impl JsonCheck {
    /// Splits the entry into a one-element batch, or a perfdata check when
    /// no return code was given.
    pub fn into_kind(self) -> Result<CheckResultBatch, PerfdataCheck> {
        match self.return_code {
            Some(code) => Ok(CheckResultBatch {
                time_stamps: vec![self.time_stamp],
                host_names: vec![self.host_name.unwrap_or_default()],
                service_descriptions: vec![self.service_description],
                return_codes: vec![code],
                outputs: vec![self.output],
            }),
            None => Err(PerfdataCheck {
                host_name: self.host_name,
                service_description: self.service_description,
                perfdata: self.perfdata,
                time: self.time.or(self.time_stamp),
            }),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Acknowledgement {
    pub action: Action,
    pub timestamp: Option<i64>,
    pub host_name: Option<String>,
    pub service_description: Option<String>,
    pub sticky: Option<Flag>,
    pub notify: Option<Flag>,
    pub persistent: Option<Flag>,
    pub author: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Downtime {
    pub action: Action,
    pub timestamp: Option<i64>,
    pub host_name: Option<String>,
    pub service_description: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// 1 for a window between start and end, 0 for a flexible window of
    /// `duration` seconds.
    pub fixed: Option<Flag>,
    pub duration: Option<i64>,
    pub trigger_id: Option<i64>,
    pub author: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecheckRequest {
    pub timestamp: Option<i64>,
    pub host_name: Option<String>,
    pub service_description: Option<String>,
}

/// Boolean-like option rendered as a single digit.
///
/// Digits are kept as given (sticky acknowledgements use `2`); words map to
/// `1` or `0`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Flag(u8);

impl Flag {
    pub const ON: Self = Self(1);
    pub const OFF: Self = Self(0);
}

impl Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => return Ok(Self::ON),
            "false" | "no" | "off" => return Ok(Self::OFF),
            _ => {}
        }
        match raw.as_bytes() {
            [digit @ b'0'..=b'9'] => Ok(Self(digit - b'0')),
            _ => Err(format!("expected 0-9 or a boolean, got {raw:?}")),
        }
    }
}

/// Integer that may arrive as a JSON number (possibly fractional, as
/// produced by `time.time()`-style clients) or as a numeric string.
pub(crate) struct LenientInt;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> DeserializeAs<'de, i64> for LenientInt {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<i64, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawInt::deserialize(deserializer)? {
            RawInt::Int(value) => Ok(value),
            RawInt::Float(value) => float_to_int(value).ok_or_else(|| {
                serde::de::Error::custom(format!("number out of range: {value}"))
            }),
            RawInt::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(float_to_int))
                    .ok_or_else(|| serde::de::Error::custom(format!("not an integer: {text:?}")))
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    (truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64)
        .then_some(truncated as i64)
}

#[cfg(test)]
mod tests {
    use super::{Flag, JsonCheck, PerfdataCheck};
    use std::str::FromStr;

    #[test]
    fn flag_accepts_digits_and_words() {
        assert_eq!(Flag::from_str("2"), Ok(Flag(2)));
        assert_eq!(Flag::from_str("TRUE"), Ok(Flag::ON));
        assert_eq!(Flag::from_str("off"), Ok(Flag::OFF));
        assert!(Flag::from_str("12").is_err());
        assert!(Flag::from_str("1;2").is_err());
    }

    #[test]
    fn perfdata_time_accepts_float_and_string() {
        let checks: Vec<PerfdataCheck> = match serde_json::from_str(
            r#"[{"host_name":"a","perfdata":"x=1","time":1700000000.75},
                {"host_name":"b","perfdata":"y=2","time":"1700000001"},
                {"host_name":"c","perfdata":"z=3"}]"#,
        ) {
            Ok(checks) => checks,
            Err(err) => panic!("failed to parse checks: {err}"),
        };
        assert_eq!(checks[0].time, Some(1_700_000_000));
        assert_eq!(checks[1].time, Some(1_700_000_001));
        assert_eq!(checks[2].time, None);
    }

    #[test]
    fn json_check_with_zero_return_code_is_a_check_result() {
        let check: JsonCheck = match serde_json::from_str(
            r#"{"host_name":"srv","return_code":0,"output":"OK"}"#,
        ) {
            Ok(check) => check,
            Err(err) => panic!("failed to parse check: {err}"),
        };
        let batch = match check.into_kind() {
            Ok(batch) => batch,
            Err(_) => panic!("expected a check result"),
        };
        assert_eq!(batch.return_codes, vec![0]);
        assert_eq!(batch.host_names, vec!["srv".to_string()]);
    }

    #[test]
    fn json_check_without_return_code_is_perfdata() {
        let check = JsonCheck {
            host_name: Some("srv".into()),
            perfdata: Some("load=1".into()),
            time_stamp: Some(10),
            ..JsonCheck::default()
        };
        match check.into_kind() {
            Err(perf) => {
                assert_eq!(perf.perfdata.as_deref(), Some("load=1"));
                assert_eq!(perf.time, Some(10));
            }
            Ok(_) => panic!("expected perfdata"),
        }
    }
}
