use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP server failed")]
    Server {
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("missing required configuration field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

/// Client input that cannot be turned into a command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Missing parameter {field}")]
    MissingField { field: &'static str },
    #[error(
        "number of return codes ({return_codes}) does not match number of hosts ({hosts})"
    )]
    CountMismatch { return_codes: usize, hosts: usize },
    #[error("invalid parameter {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    #[error("Authentication required")]
    Missing,
    #[error("Authentication denied")]
    Denied,
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum SinkError {
    #[error("command queue is closed")]
    Closed,
    #[error("command queue is full")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to write command file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("retry budget exhausted")]
    RetryExhausted {
        #[source]
        source: Box<DispatchError>,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

impl DispatchError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
