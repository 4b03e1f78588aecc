pub mod disabled;
pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use disabled::DisabledCollection;
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// A thread-safe key-value store that can hold multiple collections.
///
/// Persistent collections live in a fjall keyspace. When the keyspace could
/// not be opened they are handed out as [`DisabledCollection`]s, so callers
/// see storage failures instead of a crash.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Result<Keyspace, String>,
}

impl KeyValueStore {
    pub fn open(data_path: &Path) -> Self {
        let cache_dir = data_path.join("store");
        let keyspace = fjall::Config::new(&cache_dir).open().map_err(|e| {
            warn!(
                "Could not open storage at {}: {}. Continuing without persistence",
                cache_dir.display(),
                e
            );
            e.to_string()
        });

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    /// A store with no persistent backend; only in-memory collections work.
    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Err("persistence disabled".to_string()),
        }
    }

    fn open_persistent(&self, name: &str) -> Arc<dyn KeyValueCollection> {
        let keyspace = match &self.keyspace {
            Ok(keyspace) => keyspace,
            Err(reason) => return Arc::new(DisabledCollection::new(reason.clone())),
        };

        match keyspace.open_partition(name, PartitionCreateOptions::default()) {
            Ok(partition) => Arc::new(DiskCollection::new(keyspace.clone(), partition)),
            Err(e) => {
                warn!("Could not open storage collection {}: {}", name, e);
                Arc::new(DisabledCollection::new(e.to_string()))
            }
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection> {
        let key = format!("{name}:{persist}");
        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Arc::clone(collection);
        }

        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let collection = collections.entry(key).or_insert_with(|| {
            debug!("Opening collection {} (persist: {})", name, persist);
            if persist {
                self.open_persistent(name)
            } else {
                Arc::new(MemoryCollection::new())
            }
        });
        Arc::clone(collection)
    }
}
