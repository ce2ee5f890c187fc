use crate::core::transform::truncate_chars;
use crate::domain::model::ScrapeRequest;
use crate::server::{auth, AppState};
use crate::utils::error::{ErrorCategory, ScrapeError};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Instant;

/// `POST /scrape`: run one agent scrape and answer with the record array.
pub async fn scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ScrapeRequest>,
) -> Response {
    if let Err(response) = auth::verify_token(&headers, &state.api_token) {
        return *response;
    }

    if request.task.trim().is_empty() {
        return error_response(&ScrapeError::Validation {
            message: "task must not be empty".to_string(),
        });
    }

    tracing::info!(
        "Scrape request accepted: {}",
        truncate_chars(request.task.trim(), 80)
    );
    let started = Instant::now();

    match state.engine.run(&request.task).await {
        Ok(outcome) => {
            tracing::info!(
                "Scrape request served: {} records in {:?}",
                outcome.records.len(),
                started.elapsed()
            );
            Json(outcome.records).into_response()
        }
        Err(e) => {
            tracing::error!(
                "Scrape request failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            error_response(&e)
        }
    }
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

fn error_response(error: &ScrapeError) -> Response {
    let status = match error {
        ScrapeError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => match error.category() {
            ErrorCategory::Configuration | ErrorCategory::System | ErrorCategory::Data => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCategory::Network
            | ErrorCategory::Browser
            | ErrorCategory::Llm
            | ErrorCategory::Agent => StatusCode::BAD_GATEWAY,
        },
    };

    (
        status,
        Json(serde_json::json!({ "detail": error.user_friendly_message() })),
    )
        .into_response()
}
