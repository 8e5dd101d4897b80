use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::user_sync::BLOCKCHAIN_USERS;
use crate::services::UserSyncService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default, alias = "fromBlock")]
    pub from_block: Option<u64>,
}

fn sync_service(state: &AppState) -> Result<&Arc<UserSyncService>, AppError> {
    state.user_sync.as_ref().ok_or_else(|| {
        AppError::Unavailable("User sync needs DATABASE_URL and ALCHEMY_API_KEY".into())
    })
}

/// Start a background sync of the user directory from on-chain buyers.
pub async fn start(
    State(state): State<AppState>,
    body: Option<Json<SyncRequest>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let sync = sync_service(&state)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();

    if !sync.start(req.from_block).await? {
        return Err(AppError::Conflict("Sync already in progress".into()));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "User sync started",
            "status": "running",
            "fromBlock": req.from_block.map_or_else(|| json!("resume"), |b| json!(b)),
        })),
    ))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let sync = sync_service(&state)?;

    let body = match sync.status().await? {
        Some(status) => serde_json::to_value(status).map_err(anyhow::Error::from)?,
        None => json!({
            "syncType": BLOCKCHAIN_USERS,
            "status": "never_run",
            "lastSyncAt": null,
            "lastBlockNumber": null,
        }),
    };
    Ok(Json(body))
}
