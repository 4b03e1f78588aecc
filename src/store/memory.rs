use crate::core::cache::{KeyValueCollection, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory collection with an optional quota on the total size of keys
/// and values, in bytes.
pub struct MemoryCollection {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BTreeMap::new())),
            quota: None,
        }
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn used_bytes(map: &BTreeMap<String, String>) -> usize {
    map.iter().map(|(k, v)| k.len() + v.len()).sum()
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.inner.lock().await;
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock().await;
        if let Some(quota) = self.quota {
            let replaced = map.get(key).map_or(0, |old| key.len() + old.len());
            let needed = used_bytes(&map) - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock().await;
        map.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let map = self.inner.lock().await;
        debug!("Memory collection holds {} keys", map.len());
        Ok(map.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_collection_get_put_remove() {
        let collection = MemoryCollection::new();

        assert!(collection.get("key1").await.unwrap().is_none());

        collection.put("key1", "value1").await.unwrap();
        assert_eq!(
            collection.get("key1").await.unwrap().as_deref(),
            Some("value1")
        );

        collection.remove("key1").await.unwrap();
        assert!(collection.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_collection_keys_are_ordered() {
        let collection = MemoryCollection::new();

        collection.put("b", "2").await.unwrap();
        collection.put("a", "1").await.unwrap();
        collection.put("ab", "3").await.unwrap();

        assert_eq!(collection.keys().await.unwrap(), vec!["a", "ab", "b"]);
        assert_eq!(
            collection.keys_with_prefix("a").await.unwrap(),
            vec!["a", "ab"]
        );
    }

    #[tokio::test]
    async fn test_memory_collection_quota() {
        let collection = MemoryCollection::with_quota(10);

        collection.put("k", "123456789").await.unwrap();
        // Overwriting the same key reuses its space
        collection.put("k", "987654321").await.unwrap();

        let err = collection.put("k2", "x").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::QuotaExceeded {
                needed: 13,
                quota: 10
            }
        ));
        assert!(collection.get("k2").await.unwrap().is_none());
    }
}
