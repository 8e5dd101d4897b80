//! Key-value cache for extraction results and set listings.
//!
//! Backends never surface errors: failures are logged and read as misses,
//! so a cache outage only costs upstream requests.

mod memory;
mod redis_cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_raw(&self, key: &str) -> Option<String>;

    /// Store `value`; `ttl` of `None` means no expiry.
    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>);

    async fn exists(&self, key: &str) -> bool;

    async fn del(&self, key: &str);

    /// Remaining time to live. `None` when the key is missing or persistent.
    async fn ttl(&self, key: &str) -> Option<Duration>;

    async fn ping(&self) -> bool;

    fn backend(&self) -> &'static str;
}

impl dyn Cache {
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl).await,
            Err(e) => tracing::warn!(key, error = %e, "failed to encode cache entry"),
        }
    }
}

/// Namespaced cache keys.
pub struct CacheKeys;

impl CacheKeys {
    pub fn set(set_id: &str) -> String {
        format!("rip:set:{set_id}")
    }

    pub fn extract(input: &str) -> String {
        format!("rip:extract:{}", input.trim().to_lowercase())
    }

    pub fn profile(username: &str) -> String {
        format!("rip:profile:{}", username.trim().to_lowercase())
    }

    pub fn trade(user_a: &str, user_b: &str) -> String {
        format!(
            "rip:trade:{}:{}",
            user_a.trim().to_lowercase(),
            user_b.trim().to_lowercase()
        )
    }
}

/// Redis when a URL is configured and answers a ping, memory otherwise.
pub async fn connect(redis_url: Option<&str>) -> Arc<dyn Cache> {
    let Some(url) = redis_url else {
        tracing::info!("REDIS_URL not set, using in-memory cache");
        return Arc::new(MemoryCache::new());
    };

    match RedisCache::connect(url).await {
        Ok(cache) if cache.ping().await => {
            tracing::info!("Connected to Redis");
            Arc::new(cache)
        }
        Ok(_) => {
            tracing::warn!("Redis did not answer ping, falling back to in-memory cache");
            Arc::new(MemoryCache::new())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
            Arc::new(MemoryCache::new())
        }
    }
}
