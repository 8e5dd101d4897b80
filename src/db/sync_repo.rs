use sqlx::PgPool;

use crate::models::SyncStatus;

pub async fn get_status(pool: &PgPool, sync_type: &str) -> anyhow::Result<Option<SyncStatus>> {
    let status = sqlx::query_as::<_, SyncStatus>("SELECT * FROM sync_status WHERE sync_type = $1")
        .bind(sync_type)
        .fetch_optional(pool)
        .await?;

    Ok(status)
}

/// Claim the job. Returns `None` when another run already holds it.
pub async fn try_mark_running(pool: &PgPool, sync_type: &str) -> anyhow::Result<Option<SyncStatus>> {
    let status = sqlx::query_as::<_, SyncStatus>(
        r#"
        INSERT INTO sync_status (sync_type, status, last_sync_at)
        VALUES ($1, 'running', NOW())
        ON CONFLICT (sync_type) DO UPDATE SET
            status = 'running',
            last_sync_at = NOW(),
            error_message = NULL
        WHERE sync_status.status <> 'running'
        RETURNING *
        "#,
    )
    .bind(sync_type)
    .fetch_optional(pool)
    .await?;

    Ok(status)
}

pub async fn mark_completed(pool: &PgPool, sync_type: &str, last_block: i64) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE sync_status
        SET status = 'completed', last_block_number = $2, last_sync_at = NOW(), error_message = NULL
        WHERE sync_type = $1
        "#,
    )
    .bind(sync_type)
    .bind(last_block)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_failed(pool: &PgPool, sync_type: &str, message: &str) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE sync_status SET status = 'error', error_message = $2, last_sync_at = NOW() WHERE sync_type = $1",
    )
    .bind(sync_type)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}
