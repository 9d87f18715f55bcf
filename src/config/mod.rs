use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::Result;
use crate::error::Error as GatewayError;
use crate::types::{RouteName, UnknownActionPolicy};

mod defaults;
mod durations;
mod env;
mod raw;

pub(crate) use durations::HumantimeDuration;

/// Username that turns authentication off.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpSettings,
    pub queue: QueueSettings,
    pub dispatch: DispatchSettings,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub listen: SocketAddr,
    pub credentials: Credentials,
    pub routes: RouteSet,
    pub unknown_action: UnknownActionPolicy,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub capacity: usize,
    pub enqueue_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// External command file of the monitoring daemon. `None` logs only.
    pub command_file: Option<PathBuf>,
    pub retry_window: Duration,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

/// Enabled routes; `None` enables every route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSet(Option<BTreeSet<RouteName>>);

impl Config {
    /// Load configuration from a TOML file (optional) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration file cannot be parsed, when
    /// environment overrides are invalid, or when the resulting values fail
    /// validation.
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut raw = raw::load(path).map_err(GatewayError::from)?;
        raw.apply_env_overrides().map_err(GatewayError::from)?;
        raw.validate_and_build()
    }

    /// Build configuration from TOML text alone, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the text cannot be parsed or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        raw::load_str(text)
            .map_err(GatewayError::from)?
            .validate_and_build()
    }
}

impl HttpSettings {
    /// Anonymous settings with every route enabled.
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            credentials: Credentials::anonymous(),
            routes: RouteSet::all(),
            unknown_action: UnknownActionPolicy::default(),
            max_body_bytes: defaults::default_max_body_bytes(),
        }
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS, "")
    }

    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn has_password(&self) -> bool {
        !self.password.expose_secret().is_empty()
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password.expose_secret() == password
    }
}

impl RouteSet {
    pub const fn all() -> Self {
        Self(None)
    }

    pub fn only(routes: impl IntoIterator<Item = RouteName>) -> Self {
        Self(Some(routes.into_iter().collect()))
    }

    pub fn is_enabled(&self, route: RouteName) -> bool {
        self.0.as_ref().is_none_or(|set| set.contains(&route))
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Credentials, RouteSet};
    use crate::error::{ConfigError, Error};
    use crate::types::{RouteName, UnknownActionPolicy};
    use std::time::Duration;

    fn load(text: &str) -> Config {
        match Config::from_toml_str(text) {
            Ok(config) => config,
            Err(err) => panic!("config should load: {err}"),
        }
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = load("");
        assert_eq!(config.http.listen.to_string(), "0.0.0.0:7760");
        assert!(config.http.credentials.is_anonymous());
        assert_eq!(config.http.routes, RouteSet::all());
        assert_eq!(config.http.unknown_action, UnknownActionPolicy::Reject);
        assert_eq!(config.queue.capacity, 1024);
        assert_eq!(config.queue.enqueue_timeout, Duration::from_secs(5));
        assert!(config.dispatch.command_file.is_none());
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn parses_full_file() {
        let config = load(
            r#"
            [http]
            host = "127.0.0.1"
            port = 8080
            username = "shinken"
            password = "s3cret"
            routes = "push_check_result, acknowledge"
            unknown_action = "ignore"

            [queue]
            capacity = 16
            enqueue_timeout = "250ms"

            [dispatch]
            command_file = "/var/lib/nagios/rw/nagios.cmd"
            retry_window = "30s"

            [app]
            shutdown_grace = "1s"
            "#,
        );
        assert_eq!(config.http.listen.to_string(), "127.0.0.1:8080");
        assert!(config.http.credentials.matches("shinken", "s3cret"));
        assert!(!config.http.credentials.matches("shinken", "nope"));
        assert!(config.http.routes.is_enabled(RouteName::Acknowledge));
        assert!(!config.http.routes.is_enabled(RouteName::Restart));
        assert_eq!(config.http.unknown_action, UnknownActionPolicy::Ignore);
        assert_eq!(config.queue.capacity, 16);
        assert_eq!(config.queue.enqueue_timeout, Duration::from_millis(250));
        assert_eq!(config.dispatch.retry_window, Duration::from_secs(30));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn routes_accept_a_list() {
        let config = load(
            r#"
            [http]
            routes = ["recheck", "downtime"]
            "#,
        );
        assert_eq!(
            config.http.routes,
            RouteSet::only([RouteName::Recheck, RouteName::Downtime])
        );
    }

    #[test]
    fn unknown_route_is_rejected() {
        let err = Config::from_toml_str("[http]\nroutes = \"push_check_result_jfon\"\n");
        assert!(matches!(
            err,
            Err(Error::Config(ConfigError::InvalidField {
                field: "http.routes",
                ..
            }))
        ));
    }

    #[test]
    fn named_user_needs_a_password() {
        let err = Config::from_toml_str("[http]\nusername = \"admin\"\n");
        assert!(matches!(
            err,
            Err(Error::Config(ConfigError::InvalidField {
                field: "http.password",
                ..
            }))
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Config::from_toml_str("[queue]\ncapacity = 0\n");
        assert!(matches!(
            err,
            Err(Error::Config(ConfigError::InvalidField {
                field: "queue.capacity",
                ..
            }))
        ));
    }

    #[test]
    fn anonymous_credentials_ignore_password() {
        let creds = Credentials::anonymous();
        assert!(creds.is_anonymous());
        assert_eq!(creds.username(), "anonymous");
    }
}
