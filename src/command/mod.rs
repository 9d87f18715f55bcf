//! Canonical external commands and the builders that produce them.
//!
//! A command line always reads `[<timestamp>] <VERB>;<field>;...`. The line
//! terminator is not part of [`Command`]; [`Command::to_line`] adds it when a
//! command is written out.

mod build;
mod model;

use std::fmt::{self, Display};

pub use build::{
    DEFAULT_AUTHOR, DEFAULT_COMMENT, DEFAULT_DOWNTIME_DURATION, PERFDATA_SOURCE,
    acknowledge_command, check_result_commands, control_command, downtime_command,
    perfdata_command, perfdata_commands, recheck_command, resolve_action,
};
pub use model::{
    Acknowledgement, CheckResultBatch, Downtime, Flag, JsonCheck, PerfdataCheck, RecheckRequest,
};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Command {
    line: String,
}

impl Command {
    pub(crate) fn new(timestamp: i64, verb: &str, fields: &[&str]) -> Self {
        let mut line = format!("[{timestamp}] {verb}");
        for field in fields {
            line.push(';');
            line.push_str(field);
        }
        Self { line }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn into_string(self) -> String {
        self.line
    }

    pub fn timestamp(&self) -> Option<i64> {
        let rest = self.line.strip_prefix('[')?;
        let (ts, _) = rest.split_once(']')?;
        ts.parse().ok()
    }

    pub fn verb(&self) -> &str {
        let body = self
            .line
            .split_once("] ")
            .map_or(self.line.as_str(), |(_, body)| body);
        body.split_once(';').map_or(body, |(verb, _)| verb)
    }

    /// Wire form: the command followed by exactly one newline.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(self.line.len() + 1);
        line.push_str(&self.line);
        line.push('\n');
        line
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.line
    }
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn splits_timestamp_and_verb() {
        let cmd = Command::new(1_365_446_900, "SCHEDULE_FORCED_HOST_CHECK", &["srv", "1365446900"]);
        assert_eq!(
            cmd.as_str(),
            "[1365446900] SCHEDULE_FORCED_HOST_CHECK;srv;1365446900"
        );
        assert_eq!(cmd.timestamp(), Some(1_365_446_900));
        assert_eq!(cmd.verb(), "SCHEDULE_FORCED_HOST_CHECK");
    }

    #[test]
    fn verb_without_fields() {
        let cmd = Command::new(7, "RESTART_PROGRAM", &[]);
        assert_eq!(cmd.verb(), "RESTART_PROGRAM");
        assert_eq!(cmd.to_line(), "[7] RESTART_PROGRAM\n");
    }

    #[test]
    fn orders_by_full_line() {
        let b = Command::new(1, "PROCESS_HOST_CHECK_RESULT", &["b", "0", ""]);
        let a = Command::new(2, "PROCESS_HOST_CHECK_RESULT", &["a", "0", ""]);
        let mut cmds = vec![b.clone(), a.clone()];
        cmds.sort();
        // The timestamp prefix sorts first.
        assert_eq!(cmds, vec![b, a]);
    }
}
