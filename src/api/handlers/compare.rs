use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::errors::AppError;
use crate::extraction::extract_page;
use crate::normalize::{normalize, NormalizeOptions};
use crate::services::compare_profile;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareProfileRequest {
    pub profile: Value,
    #[serde(default)]
    pub target_url: String,
}

/// Fetch a rip.fun page and report how a submitted profile differs from it.
pub async fn compare_profile_page(
    State(state): State<AppState>,
    Json(req): Json<CompareProfileRequest>,
) -> Result<Json<Value>, AppError> {
    if !req.profile.is_object() || req.target_url.trim().is_empty() {
        return Err(AppError::BadRequest("profile and targetUrl are required".into()));
    }
    ensure_same_host(&req.target_url, &state.config.rip_base_url)?;

    let html = state.fetcher.fetch_html(req.target_url.trim()).await.map_err(|e| match e.status() {
        Some(404) => AppError::NotFound(format!("page {}", req.target_url.trim())),
        _ => AppError::Upstream(e.to_string()),
    })?;
    let page = extract_page(&html).map_err(|e| AppError::NotFound(e.to_string()))?;

    let source = page.profile().map(|profile| json!({ "profile": profile }));
    let source = source.unwrap_or_else(|| page.into_value());
    let extracted = normalize(&source, NormalizeOptions::all());
    let comparison = compare_profile(&req.profile, &extracted);

    tracing::info!(
        url = %req.target_url,
        matched = comparison.matched.len(),
        different = comparison.different.len(),
        missing = comparison.missing.len(),
        "Profile comparison complete"
    );

    Ok(Json(json!({
        "success": true,
        "comparison": comparison,
        "extractedData": extracted,
    })))
}

/// Only pages on the configured rip.fun host may be fetched.
fn ensure_same_host(target: &str, base: &str) -> Result<(), AppError> {
    let target = Url::parse(target.trim()).map_err(|_| AppError::BadRequest("targetUrl is not a URL".into()))?;
    let base = Url::parse(base).map_err(|e| AppError::Internal(anyhow::anyhow!("bad RIP_BASE_URL: {e}")))?;

    if target.host_str() != base.host_str() || target.port_or_known_default() != base.port_or_known_default() {
        return Err(AppError::BadRequest(format!(
            "targetUrl must be on {}",
            base.host_str().unwrap_or_default()
        )));
    }
    Ok(())
}
