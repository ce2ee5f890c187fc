use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const TOKEN_HEADER: &str = "X-API-Token";

/// Check the `X-API-Token` header against the configured token. On failure
/// the caller returns the prepared 401 response as-is.
pub fn verify_token(headers: &HeaderMap, expected: &str) -> Result<(), Box<Response>> {
    match headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()) {
        None => Err(Box::new(unauthorized("Missing X-API-Token header"))),
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(Box::new(unauthorized("Invalid API Token"))),
    }
}

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}
