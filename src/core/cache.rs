//! Key-value storage abstractions and the TTL cache built on top of them

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failures at the storage boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage backend error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("Stored data for key {0} is not valid UTF-8")]
    Encoding(String),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string-keyed, string-valued collection.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

/// Hands out named collections.
pub trait Store: Send + Sync {
    fn get_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection>;
}

#[derive(Serialize, Deserialize)]
struct CacheEntry<V> {
    /// Epoch millis; 0 never expires.
    expires_at: i64,
    value: V,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at != 0 && self.expires_at < now
    }
}

/// TTL cache over a [`KeyValueCollection`]. Entries are JSON blobs of
/// `{expires_at, value}`, one per key.
#[derive(Clone)]
pub struct TtlCache {
    collection: Arc<dyn KeyValueCollection>,
}

impl TtlCache {
    pub fn new(collection: Arc<dyn KeyValueCollection>) -> Self {
        Self { collection }
    }

    /// Reads a live entry, purging it if expired.
    pub async fn lookup<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, StoreError> {
        let Some(raw) = self.collection.get(key).await? else {
            debug!("Cache MISS for key: {}", key);
            return Ok(None);
        };

        let entry: CacheEntry<V> = serde_json::from_str(&raw)?;
        if entry.is_expired(Utc::now().timestamp_millis()) {
            debug!("Cache entry expired for key: {}", key);
            self.collection.remove(key).await?;
            return Ok(None);
        }

        debug!("Cache HIT for key: {}", key);
        Ok(Some(entry.value))
    }

    /// Writes an entry. `None` or a zero TTL never expires.
    pub async fn store<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = match ttl {
            Some(ttl) if !ttl.is_zero() => {
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                Utc::now().timestamp_millis().saturating_add(ttl_ms)
            }
            _ => 0,
        };
        let raw = serde_json::to_string(&CacheEntry { expires_at, value })?;
        self.collection.put(key, &raw).await?;
        debug!("Cache PUT for key: {}", key);
        Ok(())
    }

    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        match self.lookup(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Cache get error for key {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<V: Serialize>(&self, key: &str, value: &V, ttl: Option<Duration>) {
        if let Err(e) = self.store(key, value, ttl).await {
            debug!("Cache put error for key {}: {}", key, e);
        }
    }

    /// Returns the cached value or runs `producer`, caching only a present
    /// result. Producer errors propagate and leave the cache untouched.
    ///
    /// Concurrent calls for the same key may each run the producer.
    pub async fn with_cache<V, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> anyhow::Result<Option<V>>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<V>>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(Some(hit));
        }

        let value = producer().await?;
        if let Some(value) = &value {
            self.set(key, value, ttl).await;
        }
        Ok(value)
    }

    pub async fn delete(&self, key: &str) {
        match self.collection.remove(key).await {
            Ok(()) => debug!("Cache REMOVE for key: {}", key),
            Err(e) => debug!("Cache remove error for key {}: {}", key, e),
        }
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.collection
            .keys_with_prefix(prefix)
            .await
            .unwrap_or_else(|e| {
                debug!("Cache key scan error for prefix {}: {}", prefix, e);
                Vec::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::disabled::DisabledCollection;
    use crate::store::memory::MemoryCollection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn memory_cache() -> (Arc<MemoryCollection>, TtlCache) {
        let collection = Arc::new(MemoryCollection::new());
        let cache = TtlCache::new(collection.clone());
        (collection, cache)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, cache) = memory_cache();

        assert!(cache.get::<i32>("key1").await.is_none());

        cache
            .set("key1", &123, Some(Duration::from_secs(60)))
            .await;
        assert_eq!(cache.get::<i32>("key1").await, Some(123));
        assert!(cache.get::<i32>("key2").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_without_ttl_never_expires() {
        let (collection, cache) = memory_cache();

        cache.set("key1", &"value", None).await;
        cache.set("key2", &"other", Some(Duration::ZERO)).await;

        let raw = collection.get("key1").await.unwrap().unwrap();
        assert!(raw.contains("\"expires_at\":0"));
        assert_eq!(cache.get::<String>("key2").await.as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_purged_on_read() {
        let (collection, cache) = memory_cache();

        cache.set("key1", &123, Some(Duration::from_millis(10))).await;
        assert_eq!(cache.get::<i32>("key1").await, Some(123));

        sleep(Duration::from_millis(20)).await;
        assert!(cache.get::<i32>("key1").await.is_none());
        assert!(collection.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_absent() {
        let (collection, cache) = memory_cache();

        collection.put("key1", "not json").await.unwrap();
        assert!(cache.get::<i32>("key1").await.is_none());
        assert!(cache.lookup::<i32>("key1").await.is_err());
    }

    #[tokio::test]
    async fn test_with_cache_skips_producer_on_hit() {
        let (_, cache) = memory_cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .with_cache("key1", Some(Duration::from_secs(60)), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(42))
                })
                .await
                .unwrap();
            assert_eq!(value, Some(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_cache_does_not_store_absent() {
        let (collection, cache) = memory_cache();

        let value: Option<i32> = cache
            .with_cache("key1", Some(Duration::from_secs(60)), || async { Ok(None) })
            .await
            .unwrap();

        assert!(value.is_none());
        assert!(collection.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_cache_propagates_producer_error() {
        let (collection, cache) = memory_cache();

        let result: anyhow::Result<Option<i32>> = cache
            .with_cache("key1", None, || async { Err(anyhow::anyhow!("boom")) })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "boom");
        assert!(collection.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_storage_degrades_to_miss() {
        let cache = TtlCache::new(Arc::new(DisabledCollection::new("storage disabled")));

        cache.set("key1", &123, None).await;
        assert!(cache.get::<i32>("key1").await.is_none());
        assert!(cache.keys_with_prefix("key").await.is_empty());
        cache.delete("key1").await;

        let value = cache
            .with_cache("key1", None, || async { Ok(Some(7)) })
            .await
            .unwrap();
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn test_quota_exceeded_is_a_silent_no_op() {
        let collection = Arc::new(MemoryCollection::with_quota(16));
        let cache = TtlCache::new(collection.clone());

        cache.set("key1", &"a value too large for the quota", None).await;
        assert!(cache.get::<String>("key1").await.is_none());
        assert!(matches!(
            cache.store("key1", &"a value too large", None).await,
            Err(StoreError::QuotaExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_and_keys_with_prefix() {
        let (_, cache) = memory_cache();

        cache.set("quote_AAPL", &1, None).await;
        cache.set("quote_MSFT", &2, None).await;
        cache.set("settings", &3, None).await;

        assert_eq!(
            cache.keys_with_prefix("quote_").await,
            vec!["quote_AAPL".to_string(), "quote_MSFT".to_string()]
        );

        cache.delete("quote_AAPL").await;
        assert_eq!(cache.keys_with_prefix("quote_").await, vec!["quote_MSFT"]);
        assert_eq!(cache.get::<i32>("settings").await, Some(3));
    }
}
