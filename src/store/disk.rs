use crate::core::cache::{KeyValueCollection, StoreError};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use tracing::debug;

/// A collection backed by a single fjall partition.
pub struct DiskCollection {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Keyspace, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }

    // Writes only need to survive the process exiting, not a power loss.
    fn flush(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::Buffer)?;
        Ok(())
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<String, StoreError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| StoreError::Encoding(key.to_string()))
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.partition
            .get(key)?
            .map(|value| decode(key, &value))
            .transpose()
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.partition.insert(key, value)?;
        self.flush()
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.partition.remove(key)?;
        self.flush()
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.partition
            .keys()
            .map(|key| {
                let key = key?;
                decode(&String::from_utf8_lossy(&key), &key)
            })
            .collect()
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let keys = self
            .partition
            .prefix(prefix)
            .map(|kv| {
                let (key, _) = kv?;
                decode(&String::from_utf8_lossy(&key), &key)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Prefix scan for {} matched {} keys", prefix, keys.len());
        Ok(keys)
    }
}
