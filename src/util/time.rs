use chrono::{DateTime, TimeZone, Utc};

/// Source of the current epoch time, in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Always returns the same instant. Used by tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Formats epoch seconds as RFC 3339 in UTC.
pub fn fmt_epoch_utc(sec: i64) -> String {
    Utc.timestamp_opt(sec, 0)
        .single()
        .map(|d: DateTime<Utc>| d.to_rfc3339())
        .unwrap_or_else(|| format!("(invalid timestamp: {sec})"))
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, fmt_epoch_utc};

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock(1_700_000_000);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn formats_epoch_in_utc() {
        assert_eq!(fmt_epoch_utc(0), "1970-01-01T00:00:00+00:00");
    }
}
