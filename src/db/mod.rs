pub mod sync_repo;
pub mod user_repo;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const SCHEMA: [&str; 2] = [
    include_str!("../../migrations/0001_rip_users.sql"),
    include_str!("../../migrations/0002_user_sync.sql"),
];

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    for migration in SCHEMA {
        sqlx::raw_sql(migration).execute(&pool).await?;
    }

    Ok(pool)
}
