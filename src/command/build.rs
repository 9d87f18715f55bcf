use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::types::{Action, ControlKind, UnknownActionPolicy};

use super::Command;
use super::model::{
    Acknowledgement, CheckResultBatch, Downtime, Flag, PerfdataCheck, RecheckRequest,
};

pub const DEFAULT_AUTHOR: &str = "anonymous";
pub const DEFAULT_COMMENT: &str = "No comment";
pub const DEFAULT_DOWNTIME_DURATION: i64 = 86_400;
pub const PERFDATA_SOURCE: &str = "WS_Arbiter";

const DEFAULT_STICKY: Flag = Flag::ON;
const DEFAULT_NOTIFY: Flag = Flag::OFF;
const DEFAULT_PERSISTENT: Flag = Flag::ON;
const DEFAULT_FIXED: Flag = Flag::ON;
const DEFAULT_TRIGGER_ID: i64 = 0;

/// Builds one check-result command per host, sorted by command line.
///
/// An empty `return_codes` list yields no commands. A batch whose host and
/// return-code counts differ is rejected as a whole.
///
/// # Errors
///
/// Returns [`ValidationError::CountMismatch`] on a count mismatch, or a
/// field error when any entry is unusable; no partial result is returned.
pub fn check_result_commands(
    batch: &CheckResultBatch,
    now: i64,
) -> Result<Vec<Command>, ValidationError> {
    if batch.return_codes.is_empty() {
        return Ok(Vec::new());
    }
    if batch.return_codes.len() != batch.host_names.len() {
        return Err(ValidationError::CountMismatch {
            return_codes: batch.return_codes.len(),
            hosts: batch.host_names.len(),
        });
    }

    let mut commands = batch
        .host_names
        .iter()
        .zip(&batch.return_codes)
        .enumerate()
        .map(|(idx, (host, code))| -> Result<Command, ValidationError> {
            let timestamp = batch.time_stamps.get(idx).copied().flatten().unwrap_or(now);
            let host = required_key("host_name", Some(host))?;
            let service = optional_key(
                "service_description",
                batch.service_descriptions.get(idx).and_then(Option::as_deref),
            )?;
            let output = text(
                "output",
                batch.outputs.get(idx).and_then(Option::as_deref).unwrap_or(""),
            )?;
            let code = code.to_string();
            Ok(match service {
                Some(service) => Command::new(
                    timestamp,
                    "PROCESS_SERVICE_CHECK_RESULT",
                    &[host, service, &code, output],
                ),
                None => Command::new(
                    timestamp,
                    "PROCESS_HOST_CHECK_RESULT",
                    &[host, &code, output],
                ),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    commands.sort();
    for cmd in &commands {
        debug!(command = %cmd, "check result command");
    }
    Ok(commands)
}

/// # Errors
///
/// Fails when `host_name` or `perfdata` is missing, or a field is unusable.
pub fn perfdata_command(check: &PerfdataCheck, now: i64) -> Result<Command, ValidationError> {
    let host = required_key("host_name", check.host_name.as_deref())?;
    let service = optional_key(
        "service_description",
        check.service_description.as_deref().map(str::trim),
    )?;
    let perfdata = check
        .perfdata
        .as_deref()
        .ok_or(ValidationError::MissingField { field: "perfdata" })?;
    let perfdata = text("perfdata", perfdata)?;

    let verb = if service.is_some() {
        "PROCESS_SERVICE_OUTPUT"
    } else {
        "PROCESS_HOST_OUTPUT"
    };
    let payload = format!("{PERFDATA_SOURCE}|{perfdata}");
    Ok(Command::new(
        check.time.unwrap_or(now),
        verb,
        &[host, service.unwrap_or(""), &payload],
    ))
}

/// Builds commands for every usable check. Unusable checks are logged and
/// skipped; they never fail the whole list.
pub fn perfdata_commands(checks: &[PerfdataCheck], now: i64) -> Vec<Command> {
    checks
        .iter()
        .filter_map(|check| match perfdata_command(check, now) {
            Ok(cmd) => {
                debug!(command = %cmd, "perfdata command");
                Some(cmd)
            }
            Err(err) => {
                warn!(error = %err, check = ?check, "skipping perfdata check");
                None
            }
        })
        .collect()
}

/// # Errors
///
/// Fails when `host_name` is missing or a field is unusable.
pub fn acknowledge_command(ack: &Acknowledgement, now: i64) -> Result<Command, ValidationError> {
    let host = required_key("host_name", ack.host_name.as_deref())?;
    let service = optional_key("service_description", ack.service_description.as_deref())?;
    let timestamp = ack.timestamp.unwrap_or(now);

    let cmd = match (ack.action, service) {
        (Action::Add, service) => {
            let sticky = ack.sticky.unwrap_or(DEFAULT_STICKY).to_string();
            let notify = ack.notify.unwrap_or(DEFAULT_NOTIFY).to_string();
            let persistent = ack.persistent.unwrap_or(DEFAULT_PERSISTENT).to_string();
            let author = optional_key("author", ack.author.as_deref())?.unwrap_or(DEFAULT_AUTHOR);
            let comment = text("comment", ack.comment.as_deref().unwrap_or(DEFAULT_COMMENT))?;
            match service {
                Some(service) => Command::new(
                    timestamp,
                    "ACKNOWLEDGE_SVC_PROBLEM",
                    &[host, service, &sticky, &notify, &persistent, author, comment],
                ),
                None => Command::new(
                    timestamp,
                    "ACKNOWLEDGE_HOST_PROBLEM",
                    &[host, &sticky, &notify, &persistent, author, comment],
                ),
            }
        }
        (Action::Delete, Some(service)) => {
            Command::new(timestamp, "REMOVE_SVC_ACKNOWLEDGEMENT", &[host, service])
        }
        (Action::Delete, None) => Command::new(timestamp, "REMOVE_HOST_ACKNOWLEDGEMENT", &[host]),
    };
    debug!(command = %cmd, "acknowledge command");
    Ok(cmd)
}

/// # Errors
///
/// Fails when `host_name` is missing or a field is unusable.
pub fn downtime_command(dt: &Downtime, now: i64) -> Result<Command, ValidationError> {
    let host = required_key("host_name", dt.host_name.as_deref())?;
    let service = optional_key("service_description", dt.service_description.as_deref())?;
    let timestamp = dt.timestamp.unwrap_or(now);

    let cmd = match (dt.action, service) {
        (Action::Add, service) => {
            let start = dt.start_time.unwrap_or(now).to_string();
            let end = dt.end_time.unwrap_or(now).to_string();
            let fixed = dt.fixed.unwrap_or(DEFAULT_FIXED).to_string();
            let trigger_id = dt.trigger_id.unwrap_or(DEFAULT_TRIGGER_ID).to_string();
            let duration = dt.duration.unwrap_or(DEFAULT_DOWNTIME_DURATION).to_string();
            let author = optional_key("author", dt.author.as_deref())?.unwrap_or(DEFAULT_AUTHOR);
            let comment = text("comment", dt.comment.as_deref().unwrap_or(DEFAULT_COMMENT))?;
            // <start>;<end>;<fixed>;<trigger_id>;<duration>;<author>;<comment>
            let tail = [
                start.as_str(),
                end.as_str(),
                fixed.as_str(),
                trigger_id.as_str(),
                duration.as_str(),
                author,
                comment,
            ];
            match service {
                Some(service) => {
                    let mut fields = vec![host, service];
                    fields.extend(tail);
                    Command::new(timestamp, "SCHEDULE_SVC_DOWNTIME", &fields)
                }
                None => {
                    let mut fields = vec![host];
                    fields.extend(tail);
                    Command::new(timestamp, "SCHEDULE_HOST_DOWNTIME", &fields)
                }
            }
        }
        (Action::Delete, Some(service)) => {
            Command::new(timestamp, "DEL_ALL_SVC_DOWNTIMES", &[host, service])
        }
        (Action::Delete, None) => Command::new(timestamp, "DEL_ALL_HOST_DOWNTIMES", &[host]),
    };
    debug!(command = %cmd, "downtime command");
    Ok(cmd)
}

/// The request timestamp doubles as the scheduled check time.
///
/// # Errors
///
/// Fails when `host_name` is missing or a field is unusable.
pub fn recheck_command(req: &RecheckRequest, now: i64) -> Result<Command, ValidationError> {
    let host = required_key("host_name", req.host_name.as_deref())?;
    let service = optional_key("service_description", req.service_description.as_deref())?;
    let timestamp = req.timestamp.unwrap_or(now);
    let check_time = timestamp.to_string();

    let cmd = match service {
        Some(service) => Command::new(
            timestamp,
            "SCHEDULE_FORCED_SVC_CHECK",
            &[host, service, &check_time],
        ),
        None => Command::new(timestamp, "SCHEDULE_FORCED_HOST_CHECK", &[host, &check_time]),
    };
    debug!(command = %cmd, "recheck command");
    Ok(cmd)
}

pub fn control_command(kind: ControlKind, timestamp: i64) -> Command {
    Command::new(timestamp, kind.verb(), &[])
}

/// Maps the raw `action` form value to an [`Action`].
///
/// Absent or empty means [`Action::Add`]. `Ok(None)` means the request should
/// be accepted without producing a command.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownAction`] for unrecognised values under
/// [`UnknownActionPolicy::Reject`].
pub fn resolve_action(
    raw: Option<&str>,
    policy: UnknownActionPolicy,
) -> Result<Option<Action>, ValidationError> {
    let Some(raw) = raw.filter(|value| !value.is_empty()) else {
        return Ok(Some(Action::Add));
    };
    match raw.parse::<Action>() {
        Ok(action) => Ok(Some(action)),
        Err(other) => match policy {
            UnknownActionPolicy::Reject => Err(ValidationError::UnknownAction(other)),
            UnknownActionPolicy::Ignore => {
                warn!(action = %other, "ignoring request with unknown action");
                Ok(None)
            }
        },
    }
}

fn required_key<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ValidationError> {
    optional_key(field, value)?.ok_or(ValidationError::MissingField { field })
}

/// Non-final fields: may not contain the field separator.
fn optional_key<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<Option<&'a str>, ValidationError> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.contains(';') => Err(ValidationError::invalid(
            field,
            "must not contain ';'",
        )),
        Some(v) => text(field, v).map(Some),
    }
}

fn text<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.contains(['\n', '\r']) {
        return Err(ValidationError::invalid(field, "must not contain line breaks"));
    }
    Ok(value)
}
