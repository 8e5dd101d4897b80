use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::{Cache, CacheKeys};
use crate::ripfun::{RipFunClient, RipFunError};

/// Set card listings, read through the cache. Listings are stored without
/// expiry since released sets do not change.
#[derive(Clone)]
pub struct SetCatalog {
    cache: Arc<dyn Cache>,
    rip: RipFunClient,
}

impl SetCatalog {
    pub fn new(cache: Arc<dyn Cache>, rip: RipFunClient) -> Self {
        Self { cache, rip }
    }

    pub async fn get(&self, set_id: &str) -> Result<Value, RipFunError> {
        let key = CacheKeys::set(set_id);
        if let Some(cached) = self.cache.get_json::<Value>(&key).await {
            tracing::debug!(set_id, "set listing served from cache");
            return Ok(cached);
        }
        self.refresh(set_id).await
    }

    /// Fetch from rip.fun and overwrite the cached listing.
    pub async fn refresh(&self, set_id: &str) -> Result<Value, RipFunError> {
        let data = self.rip.set_cards(set_id).await?;
        self.cache.set_json(&CacheKeys::set(set_id), &data, None).await;
        tracing::info!(set_id, cards = set_size(&data).unwrap_or(0), "cached set listing");
        Ok(data)
    }

    pub async fn is_cached(&self, set_id: &str) -> bool {
        self.cache.exists(&CacheKeys::set(set_id)).await
    }

    /// Sizes of the given sets that are already cached. Never fetches.
    pub async fn cached_totals(&self, set_ids: &[String]) -> HashMap<String, usize> {
        let mut totals = HashMap::new();
        for set_id in set_ids {
            if let Some(size) = self
                .cache
                .get_json::<Value>(&CacheKeys::set(set_id))
                .await
                .as_ref()
                .and_then(set_size)
            {
                totals.insert(set_id.clone(), size);
            }
        }
        totals
    }
}

/// Card count of a set listing: the reported total, else the listed cards.
pub fn set_size(listing: &Value) -> Option<usize> {
    let reported = listing
        .get("total")
        .or_else(|| listing.get("pagination").and_then(|p| p.get("total")))
        .and_then(Value::as_u64);
    if let Some(total) = reported {
        return usize::try_from(total).ok();
    }
    listing
        .get("cards")
        .and_then(Value::as_array)
        .or_else(|| listing.as_array())
        .map(Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_size_sources() {
        assert_eq!(set_size(&json!({ "total": 165, "cards": [] })), Some(165));
        assert_eq!(set_size(&json!({ "pagination": { "total": 9 } })), Some(9));
        assert_eq!(set_size(&json!({ "cards": [1, 2, 3] })), Some(3));
        assert_eq!(set_size(&json!([1, 2])), Some(2));
        assert_eq!(set_size(&json!({ "error": "nope" })), None);
    }
}
