#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod sink;
pub mod telemetry;
pub mod types;
pub mod util;

pub type Result<T> = std::result::Result<T, error::Error>;
