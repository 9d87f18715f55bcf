use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_ID_LEN: usize = 128;

/// Reuses the caller's `x-request-id` or assigns a UUIDv7, and echoes it on
/// the response.
pub(super) async fn propagate(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| !value.is_empty() && value.len() <= MAX_ID_LEN)
        .cloned()
        .unwrap_or_else(fresh_id);
    req.headers_mut().insert(REQUEST_ID_HEADER, id.clone());

    let mut resp = next.run(req).await;
    resp.headers_mut().insert(REQUEST_ID_HEADER, id);
    resp
}

fn fresh_id() -> HeaderValue {
    let id = Uuid::now_v7().hyphenated().to_string();
    HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
