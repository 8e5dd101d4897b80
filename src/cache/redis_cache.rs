use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::Cache;

/// Redis-backed cache over one multiplexed connection, cloned per command.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "redis GET failed");
                None
            }
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) {
        let mut conn = self.conn.clone();
        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "redis SET failed");
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key).await.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "redis EXISTS failed");
            false
        })
    }

    async fn del(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!(key, error = %e, "redis DEL failed");
        }
    }

    async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut conn = self.conn.clone();
        match conn.ttl::<_, i64>(key).await {
            // -1: no expiry, -2: missing
            Ok(secs) if secs >= 0 => Some(Duration::from_secs(secs as u64)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "redis TTL failed");
                None
            }
        }
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match pong {
            Ok(reply) => reply == "PONG",
            Err(e) => {
                tracing::warn!(error = %e, "redis PING failed");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
