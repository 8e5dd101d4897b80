use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::{warm_sets, WarmReport};
use crate::AppState;

pub async fn get_set(
    State(state): State<AppState>,
    Path(set_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let set_id = set_id.trim();
    if set_id.is_empty() {
        return Err(AppError::BadRequest("Set ID is required".into()));
    }
    Ok(Json(state.sets.get(set_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct WarmRequest {
    #[serde(default)]
    pub set_ids: Option<Vec<String>>,
    #[serde(default)]
    pub force: bool,
}

/// Prefetch set listings. An absent or empty body warms the configured sets.
pub async fn warm(
    State(state): State<AppState>,
    body: Option<Json<WarmRequest>>,
) -> Result<Json<Value>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let set_ids = req
        .set_ids
        .filter(|ids| !ids.is_empty())
        .unwrap_or_else(|| state.config.warm_set_ids.clone());

    let report: WarmReport = warm_sets(
        &state.sets,
        &set_ids,
        state.config.warm_batch_size,
        state.config.warm_batch_delay,
        req.force,
    )
    .await;

    Ok(Json(json!({
        "success": report.failed.is_empty(),
        "results": report,
        "timestamp": chrono::Utc::now(),
    })))
}
