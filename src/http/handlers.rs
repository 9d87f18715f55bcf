use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::command::{
    Acknowledgement, Command, Downtime, JsonCheck, PerfdataCheck, RecheckRequest,
    acknowledge_command, check_result_commands, control_command, downtime_command,
    perfdata_command, perfdata_commands, recheck_command, resolve_action,
};
use crate::error::ValidationError;
use crate::types::ControlKind;

use super::AppState;
use super::form::FormFields;
use super::response::{ApiError, MALFORMED_JSON, Queued, Status};

type CommandReply = Result<Json<Queued>, ApiError>;

pub(super) async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        ok: true,
        queued: state.sink.len(),
    })
}

/// Unusable entries drop the whole batch with a 200; only a count mismatch
/// is reported to the client.
pub(super) async fn push_check_result(State(state): State<AppState>, body: Bytes) -> CommandReply {
    let now = state.clock.now();
    let form = FormFields::parse(&body);
    let batch = match form.check_result_batch() {
        Ok(batch) => batch,
        Err(err @ ValidationError::CountMismatch { .. }) => return Err(err.into()),
        Err(err) => {
            warn!(error = %err, "discarding check result batch");
            return Ok(Json(Queued { queued: 0 }));
        }
    };
    match check_result_commands(&batch, now) {
        Ok(commands) => enqueue(&state, commands).await,
        Err(err @ ValidationError::CountMismatch { .. }) => Err(err.into()),
        Err(err) => {
            warn!(error = %err, "discarding check result batch");
            Ok(Json(Queued { queued: 0 }))
        }
    }
}

pub(super) async fn push_checks_perfdata(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> CommandReply {
    let now = state.clock.now();
    let checks: Vec<PerfdataCheck> = parse_json_list(&headers, &body)?;
    enqueue(&state, perfdata_commands(&checks, now)).await
}

/// Entries with a `return_code` are check results, the others perfdata.
pub(super) async fn push_check_result_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> CommandReply {
    let now = state.clock.now();
    let items: Vec<JsonCheck> = parse_json_list(&headers, &body)?;

    let mut commands = Vec::with_capacity(items.len());
    for item in items {
        match item.into_kind() {
            Ok(batch) => match check_result_commands(&batch, now) {
                Ok(built) => commands.extend(built),
                Err(err) => warn!(error = %err, "skipping check result"),
            },
            Err(check) => match perfdata_command(&check, now) {
                Ok(cmd) => commands.push(cmd),
                Err(err) => warn!(error = %err, check = ?check, "skipping perfdata check"),
            },
        }
    }
    enqueue(&state, commands).await
}

pub(super) async fn restart(State(state): State<AppState>, body: Bytes) -> CommandReply {
    control(&state, ControlKind::Restart, &body).await
}

pub(super) async fn reload(State(state): State<AppState>, body: Bytes) -> CommandReply {
    control(&state, ControlKind::Reload, &body).await
}

async fn control(state: &AppState, kind: ControlKind, body: &[u8]) -> CommandReply {
    let form = FormFields::parse(body);
    let timestamp = form
        .int("time_stamp")?
        .unwrap_or_else(|| state.clock.now());
    let cmd = control_command(kind, timestamp);
    warn!(command = %cmd, "program control requested");
    enqueue(state, vec![cmd]).await
}

pub(super) async fn acknowledge(State(state): State<AppState>, body: Bytes) -> CommandReply {
    let now = state.clock.now();
    let form = FormFields::parse(&body);
    let Some(action) = resolve_action(form.get("action"), state.settings.unknown_action)? else {
        return Ok(Json(Queued { queued: 0 }));
    };
    let ack = Acknowledgement {
        action,
        timestamp: form.int("time_stamp")?,
        host_name: form.string("host_name"),
        service_description: form.string("service_description"),
        sticky: form.flag("sticky")?,
        notify: form.flag("notify")?,
        persistent: form.flag("persistent")?,
        author: form.string("author"),
        comment: form.string("comment"),
    };
    let cmd = acknowledge_command(&ack, now)?;
    enqueue(&state, vec![cmd]).await
}

pub(super) async fn downtime(State(state): State<AppState>, body: Bytes) -> CommandReply {
    let now = state.clock.now();
    let form = FormFields::parse(&body);
    let Some(action) = resolve_action(form.get("action"), state.settings.unknown_action)? else {
        return Ok(Json(Queued { queued: 0 }));
    };
    let dt = Downtime {
        action,
        timestamp: form.int("time_stamp")?,
        host_name: form.string("host_name"),
        service_description: form.string("service_description"),
        start_time: form.int("start_time")?,
        end_time: form.int("end_time")?,
        fixed: form.flag("fixed")?,
        duration: form.int("duration")?,
        trigger_id: form.int("trigger_id")?,
        author: form.string("author"),
        comment: form.string("comment"),
    };
    let cmd = downtime_command(&dt, now)?;
    enqueue(&state, vec![cmd]).await
}

pub(super) async fn recheck(State(state): State<AppState>, body: Bytes) -> CommandReply {
    let now = state.clock.now();
    let form = FormFields::parse(&body);
    let req = RecheckRequest {
        timestamp: form.int("time_stamp")?,
        host_name: form.string("host_name"),
        service_description: form.string("service_description"),
    };
    let cmd = recheck_command(&req, now)?;
    enqueue(&state, vec![cmd]).await
}

fn parse_json_list<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<Vec<T>, ApiError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"));
    if !is_json {
        warn!("content type is not JSON, parsing body anyway");
    }
    serde_json::from_slice(body).map_err(|err| {
        warn!(error = %err, "malformed JSON body");
        ApiError::bad_request(MALFORMED_JSON)
    })
}

async fn enqueue(state: &AppState, commands: Vec<Command>) -> CommandReply {
    if commands.is_empty() {
        return Ok(Json(Queued { queued: 0 }));
    }
    let queued = state.sink.submit(commands).await.map_err(|err| {
        error!(error = %err, "failed to enqueue commands");
        ApiError::from(err)
    })?;
    info!(queued, "commands enqueued");
    Ok(Json(Queued { queued }))
}
