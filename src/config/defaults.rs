use std::time::Duration;

pub(super) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(super) const fn default_port() -> u16 {
    7760
}

pub(super) fn default_username() -> String {
    super::ANONYMOUS.to_string()
}

pub(super) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

pub(super) const fn default_queue_capacity() -> usize {
    1024
}

pub(super) const fn default_enqueue_timeout() -> Duration {
    Duration::from_secs(5)
}

pub(super) const fn default_retry_window() -> Duration {
    Duration::from_secs(10)
}

pub(super) const fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}
