use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the rip_users table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RipUser {
    pub id: i64,
    pub username: String,
    pub smart_wallet_address: Option<String>,
    pub owner_wallet_address: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub user_type: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields written by an upsert. `None` keeps what is already stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserUpsert<'a> {
    pub id: i64,
    pub username: &'a str,
    pub smart_wallet_address: Option<&'a str>,
    pub owner_wallet_address: Option<&'a str>,
    pub avatar: Option<&'a str>,
    pub banner: Option<&'a str>,
    pub user_type: Option<&'a str>,
}

/// Progress of a directory sync job, one row per job type.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub sync_type: String,
    pub status: String,
    pub last_block_number: Option<i64>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}
