use std::str::FromStr;

use url::form_urlencoded;

use crate::command::{CheckResultBatch, Flag};
use crate::error::ValidationError;

/// `application/x-www-form-urlencoded` body, keeping repeated keys in order.
///
/// Empty values are treated as absent everywhere.
#[derive(Clone, Debug, Default)]
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    pub fn parse(body: &[u8]) -> Self {
        Self {
            pairs: form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    /// Last non-empty value of `key`; a repeated single-valued field keeps
    /// the value posted last.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    /// Every value of `key`, empty ones included, in body order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// # Errors
    ///
    /// [`ValidationError::InvalidField`] when the value is not an integer.
    pub fn int(&self, key: &'static str) -> Result<Option<i64>, ValidationError> {
        self.get(key).map(|raw| parse_int(key, raw)).transpose()
    }

    /// # Errors
    ///
    /// [`ValidationError::InvalidField`] when the value is not a flag.
    pub fn flag(&self, key: &'static str) -> Result<Option<Flag>, ValidationError> {
        self.get(key)
            .map(|raw| Flag::from_str(raw).map_err(|message| ValidationError::invalid(key, message)))
            .transpose()
    }

    /// Collects the parallel lists posted to `/push_check_result`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::CountMismatch`] when return codes were posted and
    /// their count differs from the host count, checked before any value is
    /// parsed. Otherwise fails when a `time_stamp` or `return_code` entry is
    /// not an integer.
    pub fn check_result_batch(&self) -> Result<CheckResultBatch, ValidationError> {
        let return_code_count = self.all("return_code").count();
        let host_count = self.all("host_name").count();
        if return_code_count > 0 && return_code_count != host_count {
            return Err(ValidationError::CountMismatch {
                return_codes: return_code_count,
                hosts: host_count,
            });
        }

        let time_stamps = self
            .all("time_stamp")
            .map(|raw| optional_int("time_stamp", raw))
            .collect::<Result<Vec<_>, _>>()?;
        let return_codes = self
            .all("return_code")
            .map(|raw| parse_int("return_code", raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CheckResultBatch {
            time_stamps,
            host_names: self.all("host_name").map(ToString::to_string).collect(),
            service_descriptions: self.all("service_description").map(non_empty).collect(),
            return_codes,
            outputs: self.all("output").map(non_empty).collect(),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn optional_int(key: &'static str, raw: &str) -> Result<Option<i64>, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_int(key, raw).map(Some)
}

fn parse_int(key: &'static str, raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse()
        .map_err(|_| ValidationError::invalid(key, format!("expected an integer, got {raw:?}")))
}
