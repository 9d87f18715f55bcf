use std::collections::BTreeSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;

use crate::Result;
use crate::error::ConfigError;
use crate::types::{RouteName, UnknownActionPolicy};

use super::defaults::{
    default_enqueue_timeout, default_host, default_max_body_bytes, default_port,
    default_queue_capacity, default_retry_window, default_shutdown_grace, default_username,
};
use super::env::{env_parse, env_string};
use super::{
    Config, Credentials, DispatchSettings, HttpSettings, HumantimeDuration, QueueSettings,
    RouteSet,
};

const ENV_PREFIX: &str = "ARBITER_GATEWAY";

pub(super) fn load(path: impl AsRef<Path>) -> std::result::Result<RawConfig, ConfigError> {
    let path = path.as_ref();
    ::config::Config::builder()
        .add_source(::config::File::from(path).required(false))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|err| match err {
            ::config::ConfigError::Foreign(source) => ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::other(source),
            },
            other => ConfigError::Parse(other.to_string()),
        })?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

pub(super) fn load_str(text: &str) -> std::result::Result<RawConfig, ConfigError> {
    ::config::Config::builder()
        .add_source(::config::File::from_str(text, ::config::FileFormat::Toml))
        .build()
        .map_err(|err| ConfigError::Parse(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Deserialize)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub(super) http: RawHttp,
    #[serde(default)]
    pub(super) queue: RawQueue,
    #[serde(default)]
    pub(super) dispatch: RawDispatch,
    #[serde(default)]
    pub(super) app: RawApp,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawHttp {
    #[serde(default = "default_host")]
    pub(super) host: String,
    #[serde(default = "default_port")]
    pub(super) port: u16,
    #[serde(default = "default_username")]
    pub(super) username: String,
    #[serde(default)]
    pub(super) password: Option<String>,
    #[serde(default)]
    pub(super) routes: Option<RawRoutes>,
    #[serde(default)]
    pub(super) unknown_action: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub(super) max_body_bytes: usize,
}

/// `routes` may be a comma separated string or a list of names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawRoutes {
    List(Vec<String>),
    Csv(String),
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawQueue {
    #[serde(default = "default_queue_capacity")]
    pub(super) capacity: usize,
    #[serde(default = "default_enqueue_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) enqueue_timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawDispatch {
    #[serde(default)]
    pub(super) command_file: Option<PathBuf>,
    #[serde(default = "default_retry_window")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) retry_window: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawApp {
    #[serde(default = "default_shutdown_grace")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) shutdown_grace: Duration,
}

impl RawConfig {
    /// Flat variables kept for deployments that predate the prefixed form.
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(host) = env_string("WS_HOST")? {
            self.http.host = host;
        }
        if let Some(port) = env_parse::<u16>("WS_PORT")? {
            self.http.port = port;
        }
        if let Some(username) = env_string("WS_USERNAME")? {
            self.http.username = username;
        }
        if let Some(password) = env_string("WS_PASSWORD")? {
            self.http.password = Some(password);
        }
        if let Some(routes) = env_string("WS_ROUTES")? {
            self.http.routes = Some(RawRoutes::Csv(routes));
        }
        if let Some(policy) = env_string("WS_UNKNOWN_ACTION")? {
            self.http.unknown_action = Some(policy);
        }
        if let Some(path) = env_string("WS_COMMAND_FILE")? {
            self.dispatch.command_file = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub(super) fn validate_and_build(self) -> Result<Config> {
        let listen = resolve_listen(&self.http.host, self.http.port)?;

        let password = self.http.password.unwrap_or_default();
        let credentials = Credentials::new(self.http.username, password);
        if !credentials.is_anonymous() {
            if credentials.username().trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    field: "http.username",
                    message: "username cannot be empty".to_string(),
                }
                .into());
            }
            if !credentials.has_password() {
                return Err(ConfigError::InvalidField {
                    field: "http.password",
                    message: format!(
                        "a password is required unless username is \"{}\"",
                        super::ANONYMOUS
                    ),
                }
                .into());
            }
        }

        let routes = match self.http.routes {
            None => RouteSet::all(),
            Some(raw) => RouteSet::only(parse_routes(raw)?),
        };

        let unknown_action = self
            .http
            .unknown_action
            .as_deref()
            .map(UnknownActionPolicy::from_str)
            .transpose()
            .map_err(|message| ConfigError::InvalidField {
                field: "http.unknown_action",
                message,
            })?
            .unwrap_or_default();

        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidField {
                field: "http.max_body_bytes",
                message: "body limit must be greater than zero".to_string(),
            }
            .into());
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::InvalidField {
                field: "queue.capacity",
                message: "queue capacity must be greater than zero".to_string(),
            }
            .into());
        }
        if self.queue.enqueue_timeout.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "queue.enqueue_timeout",
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }
        if self.dispatch.retry_window.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "dispatch.retry_window",
                message: "retry window must be greater than zero".to_string(),
            }
            .into());
        }
        let command_file = self
            .dispatch
            .command_file
            .filter(|path| !path.as_os_str().is_empty());

        Ok(Config {
            http: HttpSettings {
                listen,
                credentials,
                routes,
                unknown_action,
                max_body_bytes: self.http.max_body_bytes,
            },
            queue: QueueSettings {
                capacity: self.queue.capacity,
                enqueue_timeout: self.queue.enqueue_timeout,
            },
            dispatch: DispatchSettings {
                command_file,
                retry_window: self.dispatch.retry_window,
            },
            shutdown_grace: self.app.shutdown_grace,
        })
    }
}

fn resolve_listen(host: &str, port: u16) -> std::result::Result<SocketAddr, ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidField {
            field: "http.port",
            message: "port must be greater than zero".to_string(),
        });
    }
    (host.trim(), port)
        .to_socket_addrs()
        .map_err(|err| ConfigError::InvalidField {
            field: "http.host",
            message: err.to_string(),
        })?
        .next()
        .ok_or_else(|| ConfigError::InvalidField {
            field: "http.host",
            message: format!("{host} does not resolve to an address"),
        })
}

fn parse_routes(raw: RawRoutes) -> std::result::Result<BTreeSet<RouteName>, ConfigError> {
    let names: Vec<String> = match raw {
        RawRoutes::List(list) => list,
        RawRoutes::Csv(csv) => csv.split(',').map(ToString::to_string).collect(),
    };
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| {
            RouteName::from_str(name).map_err(|message| ConfigError::InvalidField {
                field: "http.routes",
                message,
            })
        })
        .collect()
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: None,
            routes: None,
            unknown_action: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for RawQueue {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            enqueue_timeout: default_enqueue_timeout(),
        }
    }
}

impl Default for RawDispatch {
    fn default() -> Self {
        Self {
            command_file: None,
            retry_window: default_retry_window(),
        }
    }
}

impl Default for RawApp {
    fn default() -> Self {
        Self {
            shutdown_grace: default_shutdown_grace(),
        }
    }
}
