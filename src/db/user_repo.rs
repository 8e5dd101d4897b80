use sqlx::PgPool;

use crate::models::{RipUser, UserUpsert};

/// Look up a rip.fun user by username, ignoring case.
pub async fn get_user_by_username(pool: &PgPool, username: &str) -> anyhow::Result<Option<RipUser>> {
    let user = sqlx::query_as::<_, RipUser>(
        "SELECT * FROM rip_users WHERE LOWER(username) = LOWER($1)",
    )
    .bind(username.trim())
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn get_user_by_id(pool: &PgPool, id: i64) -> anyhow::Result<Option<RipUser>> {
    let user = sqlx::query_as::<_, RipUser>("SELECT * FROM rip_users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Insert a user or refresh the stored fields for its id. Optional fields
/// already on record are kept when the new value is NULL.
pub async fn upsert_user(pool: &PgPool, user: &UserUpsert<'_>) -> anyhow::Result<RipUser> {
    let row = sqlx::query_as::<_, RipUser>(
        r#"
        INSERT INTO rip_users
            (id, username, smart_wallet_address, owner_wallet_address, avatar, banner, user_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            username = EXCLUDED.username,
            smart_wallet_address = COALESCE(EXCLUDED.smart_wallet_address, rip_users.smart_wallet_address),
            owner_wallet_address = COALESCE(EXCLUDED.owner_wallet_address, rip_users.owner_wallet_address),
            avatar = COALESCE(EXCLUDED.avatar, rip_users.avatar),
            banner = COALESCE(EXCLUDED.banner, rip_users.banner),
            user_type = COALESCE(EXCLUDED.user_type, rip_users.user_type),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(user.username)
    .bind(user.smart_wallet_address)
    .bind(user.owner_wallet_address)
    .bind(user.avatar)
    .bind(user.banner)
    .bind(user.user_type)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Record that `address` belongs to `user_id`, as seen at `block_number`.
pub async fn upsert_address(
    pool: &PgPool,
    address: &str,
    user_id: i64,
    block_number: Option<i64>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO rip_user_addresses (address, rip_user_id, block_number)
        VALUES (LOWER($1), $2, $3)
        ON CONFLICT (address, rip_user_id) DO UPDATE SET
            block_number = EXCLUDED.block_number,
            updated_at = NOW()
        "#,
    )
    .bind(address)
    .bind(user_id)
    .bind(block_number)
    .execute(pool)
    .await?;

    Ok(())
}
