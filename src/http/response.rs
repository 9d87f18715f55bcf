use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{AuthError, SinkError, ValidationError};

const REALM: &str = "Basic realm=\"arbiter-gateway\"";

pub(super) const MALFORMED_JSON: &str = "An error occured. JSON data malformed.";

/// Error reply: status plus a plain-text message.
#[derive(Debug)]
pub struct ApiError {
    pub code: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut resp = (self.code, self.message).into_response();
        if self.code == StatusCode::UNAUTHORIZED {
            resp.headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
        }
        resp
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match err {
            AuthError::Missing => StatusCode::UNAUTHORIZED,
            AuthError::Denied => StatusCode::FORBIDDEN,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl From<SinkError> for ApiError {
    fn from(err: SinkError) -> Self {
        Self {
            code: StatusCode::SERVICE_UNAVAILABLE,
            message: err.to_string(),
        }
    }
}

/// Success body of every command route.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Queued {
    pub queued: usize,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Status {
    pub ok: bool,
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use crate::error::{AuthError, SinkError, ValidationError};
    use axum::http::StatusCode;
    use axum::http::header::WWW_AUTHENTICATE;
    use axum::response::IntoResponse;

    #[test]
    fn maps_error_kinds_to_status() {
        let missing = ApiError::from(ValidationError::MissingField { field: "host_name" });
        assert_eq!(missing.code, StatusCode::BAD_REQUEST);
        assert_eq!(missing.message, "Missing parameter host_name");

        assert_eq!(ApiError::from(AuthError::Denied).code, StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(SinkError::Timeout).code,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let resp = ApiError::from(AuthError::Missing).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(WWW_AUTHENTICATE));

        let resp = ApiError::from(AuthError::Denied).into_response();
        assert!(!resp.headers().contains_key(WWW_AUTHENTICATE));
    }
}
