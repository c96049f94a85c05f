//! Health check endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.controller.pool();

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "mirage",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "cached_assets": state.assets.len(),
            "sessions": {
                "capacity": pool.capacity(),
                "available": pool.available(),
            }
        })),
    )
}
