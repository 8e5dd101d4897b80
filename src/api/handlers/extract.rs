use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::{ExtractOptions, ExtractionMethod, ExtractionResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub method: ExtractionMethod,
    #[serde(default, alias = "forceRefresh")]
    pub force_refresh: bool,
}

#[derive(Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: ExtractionResult,
}

pub async fn extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    if req.username.trim().is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }

    let opts = ExtractOptions {
        method: req.method,
        force_refresh: req.force_refresh,
    };
    let result = state.extraction.extract(&req.username, opts).await?;

    Ok(Json(ExtractResponse {
        success: true,
        result,
    }))
}
