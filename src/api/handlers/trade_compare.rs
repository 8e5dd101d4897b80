use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::{TradeComparison, TradePage};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    #[serde(default)]
    pub user_a: String,
    #[serde(default)]
    pub user_b: String,
    #[serde(default, alias = "force_refresh")]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub user_a: String,
    #[serde(default)]
    pub user_b: String,
    pub set: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Serialize)]
pub struct PageResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: TradePage,
    pub timestamp: DateTime<Utc>,
}

pub async fn compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<Envelope<TradeComparison>>, AppError> {
    let comparison = state
        .trades
        .compare(&req.user_a, &req.user_b, req.force_refresh)
        .await?;

    Ok(Json(Envelope {
        success: true,
        data: comparison,
    }))
}

pub async fn page(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<PageResponse>, AppError> {
    let page = state
        .trades
        .page(
            &q.user_a,
            &q.user_b,
            q.set.as_deref(),
            q.page.unwrap_or(1),
            q.limit.unwrap_or(50),
        )
        .await?;

    Ok(Json(PageResponse {
        success: true,
        page,
        timestamp: Utc::now(),
    }))
}
