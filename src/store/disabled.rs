use crate::core::cache::{KeyValueCollection, StoreError};
use async_trait::async_trait;

/// Stand-in for storage that could not be opened. Every operation fails.
pub struct DisabledCollection {
    reason: String,
}

impl DisabledCollection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl KeyValueCollection for DisabledCollection {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(self.unavailable())
    }

    async fn put(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(self.unavailable())
    }

    async fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(self.unavailable())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Err(self.unavailable())
    }
}
