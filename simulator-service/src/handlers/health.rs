use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "simulator-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready when the transcript store answers a ping. A service without a
/// database is always ready.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.sink.ping().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
