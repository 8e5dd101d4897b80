use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache_ok = state.cache.ping().await;
    let backend = state.cache.backend();

    if cache_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "cache": backend })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "cache": backend })),
        )
    }
}
