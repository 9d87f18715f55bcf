use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use crate::config::Credentials;
use crate::error::AuthError;

use super::AppState;
use super::response::ApiError;

/// Runs before any body parsing, so a rejected request never builds a
/// command.
pub(super) async fn require_credentials(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    match authorize(&state.settings.credentials, req.headers()) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            warn!(error = %err, path = %req.uri().path(), "request rejected");
            ApiError::from(err).into_response()
        }
    }
}

/// Checks HTTP Basic credentials. The anonymous user accepts everything.
///
/// # Errors
///
/// [`AuthError::Missing`] when no usable Basic header is present,
/// [`AuthError::Denied`] when the pair does not match.
pub fn authorize(credentials: &Credentials, headers: &HeaderMap) -> Result<(), AuthError> {
    if credentials.is_anonymous() {
        return Ok(());
    }
    let (username, password) = basic_credentials(headers).ok_or(AuthError::Missing)?;
    if credentials.matches(&username, &password) {
        Ok(())
    } else {
        Err(AuthError::Denied)
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
