use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Requested operation for acknowledgements and downtimes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Add,
    Delete,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "delete" => Ok(Self::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// What to do with an `action` value that is neither `add` nor `delete`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownActionPolicy {
    #[default]
    Reject,
    Ignore,
}

impl FromStr for UnknownActionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown action policy: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlKind {
    Restart,
    Reload,
}

impl ControlKind {
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Restart => "RESTART_PROGRAM",
            Self::Reload => "RELOAD_CONFIG",
        }
    }
}

/// Names used by the `routes` allow-list.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteName {
    PushCheckResult,
    PushChecksPerfdata,
    PushCheckResultJson,
    Restart,
    Reload,
    Acknowledge,
    Downtime,
    Recheck,
}

impl RouteName {
    pub const ALL: [Self; 8] = [
        Self::PushCheckResult,
        Self::PushChecksPerfdata,
        Self::PushCheckResultJson,
        Self::Restart,
        Self::Reload,
        Self::Acknowledge,
        Self::Downtime,
        Self::Recheck,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PushCheckResult => "push_check_result",
            Self::PushChecksPerfdata => "push_checks_perfdata",
            Self::PushCheckResultJson => "push_check_result_json",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Acknowledge => "acknowledge",
            Self::Downtime => "downtime",
            Self::Recheck => "recheck",
        }
    }
}

impl Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|route| route.as_str() == wanted)
            .ok_or_else(|| format!("unknown route: {wanted}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, RouteName, UnknownActionPolicy};
    use std::str::FromStr;

    #[test]
    fn action_from_str_is_case_insensitive() {
        assert_eq!(Action::from_str("ADD"), Ok(Action::Add));
        assert_eq!(Action::from_str(" delete "), Ok(Action::Delete));
        assert_eq!(Action::from_str("remove"), Err("remove".to_string()));
    }

    #[test]
    fn route_names_round_trip_through_display() {
        for route in RouteName::ALL {
            assert_eq!(RouteName::from_str(&route.to_string()), Ok(route));
        }
        assert!(RouteName::from_str("push_check_result_jfon").is_err());
    }

    #[test]
    fn unknown_action_policy_defaults_to_reject() {
        assert_eq!(UnknownActionPolicy::default(), UnknownActionPolicy::Reject);
        assert_eq!(
            UnknownActionPolicy::from_str("Ignore"),
            Ok(UnknownActionPolicy::Ignore)
        );
    }
}
