//! The persisted watchlist of ticker symbols

use super::cache::{KeyValueCollection, StoreError};
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{debug, warn};

pub const WATCHLIST_KEY: &str = "mpm_watchlist_v1";

/// Trims and upper-cases a ticker symbol.
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        bail!("Ticker symbol must not be empty");
    }
    Ok(symbol)
}

/// An ordered set of ticker symbols, saved after every change.
pub struct WatchlistStore {
    collection: Arc<dyn KeyValueCollection>,
    symbols: Vec<String>,
}

impl WatchlistStore {
    /// Loads the saved watchlist, falling back to `defaults` when nothing
    /// usable is stored.
    pub async fn load(collection: Arc<dyn KeyValueCollection>, defaults: &[String]) -> Self {
        let stored = match collection.get(WATCHLIST_KEY).await {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw)
                .inspect_err(|e| warn!("Ignoring corrupt watchlist: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read watchlist: {}", e);
                None
            }
        };

        let symbols = match stored {
            Some(symbols) => symbols,
            None => {
                debug!("Using default watchlist");
                defaults.to_vec()
            }
        };

        let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }

        Self {
            collection,
            symbols: unique,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Adds the symbol at the end, or removes it if present, then saves.
    /// Returns whether the symbol is now on the watchlist. The in-memory list
    /// only changes once the save succeeds.
    pub async fn toggle(&mut self, symbol: &str) -> Result<bool> {
        let symbol = normalize_symbol(symbol)?;
        let mut next = self.symbols.clone();
        let added = match next.iter().position(|s| *s == symbol) {
            Some(index) => {
                next.remove(index);
                false
            }
            None => {
                next.push(symbol);
                true
            }
        };
        write_symbols(self.collection.as_ref(), &next).await?;
        self.symbols = next;
        Ok(added)
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        write_symbols(self.collection.as_ref(), &self.symbols).await
    }
}

async fn write_symbols(
    collection: &dyn KeyValueCollection,
    symbols: &[String],
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(symbols)?;
    collection.put(WATCHLIST_KEY, &raw).await?;
    debug!("Saved watchlist: {:?}", symbols);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::disabled::DisabledCollection;
    use crate::store::memory::MemoryCollection;

    fn defaults() -> Vec<String> {
        vec!["AAPL".to_string(), "MSFT".to_string(), "NVDA".to_string()]
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let collection = Arc::new(MemoryCollection::new());
        let watchlist = WatchlistStore::load(collection, &defaults()).await;
        assert_eq!(watchlist.symbols(), defaults().as_slice());
    }

    #[tokio::test]
    async fn test_load_ignores_corrupt_data() {
        let collection = Arc::new(MemoryCollection::new());
        collection.put(WATCHLIST_KEY, "{not a list").await.unwrap();

        let watchlist = WatchlistStore::load(collection, &defaults()).await;
        assert_eq!(watchlist.symbols(), defaults().as_slice());
    }

    #[tokio::test]
    async fn test_load_enforces_uniqueness() {
        let collection = Arc::new(MemoryCollection::new());
        collection
            .put(WATCHLIST_KEY, r#"["TSLA","AAPL","TSLA"]"#)
            .await
            .unwrap();

        let watchlist = WatchlistStore::load(collection, &defaults()).await;
        assert_eq!(watchlist.symbols(), ["TSLA", "AAPL"]);
    }

    #[tokio::test]
    async fn test_toggle_persists_every_change() {
        let collection = Arc::new(MemoryCollection::new());
        let mut watchlist = WatchlistStore::load(collection.clone(), &defaults()).await;

        assert!(watchlist.toggle(" tsla ").await.unwrap());
        assert!(watchlist.contains("TSLA"));
        assert_eq!(
            collection.get(WATCHLIST_KEY).await.unwrap().as_deref(),
            Some(r#"["AAPL","MSFT","NVDA","TSLA"]"#)
        );

        assert!(!watchlist.toggle("MSFT").await.unwrap());
        let reloaded = WatchlistStore::load(collection, &defaults()).await;
        assert_eq!(reloaded.symbols(), ["AAPL", "NVDA", "TSLA"]);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_membership() {
        let collection = Arc::new(MemoryCollection::new());
        let mut watchlist = WatchlistStore::load(collection, &defaults()).await;

        watchlist.toggle("AMZN").await.unwrap();
        watchlist.toggle("AMZN").await.unwrap();
        assert_eq!(watchlist.symbols(), defaults().as_slice());

        watchlist.toggle("MSFT").await.unwrap();
        watchlist.toggle("MSFT").await.unwrap();
        assert!(watchlist.contains("MSFT"));
        // Untouched symbols keep their relative order
        assert_eq!(watchlist.symbols(), ["AAPL", "NVDA", "MSFT"]);
    }

    #[tokio::test]
    async fn test_toggle_rejects_blank_symbol() {
        let collection = Arc::new(MemoryCollection::new());
        let mut watchlist = WatchlistStore::load(collection.clone(), &defaults()).await;

        assert!(watchlist.toggle("   ").await.is_err());
        assert!(collection.get(WATCHLIST_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let collection = Arc::new(DisabledCollection::new("storage disabled"));
        let mut watchlist = WatchlistStore::load(collection, &defaults()).await;

        assert_eq!(watchlist.symbols(), defaults().as_slice());
        let err = watchlist.toggle("TSLA").await.unwrap_err();
        assert!(err.to_string().contains("storage disabled"));
        assert_eq!(watchlist.symbols(), defaults().as_slice());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_matching_storage() {
        let collection = Arc::new(MemoryCollection::with_quota(40));
        collection.put(WATCHLIST_KEY, r#"["AAPL"]"#).await.unwrap();
        let mut watchlist = WatchlistStore::load(collection.clone(), &defaults()).await;

        assert!(watchlist.toggle("AVERYLONGTICKERSYMBOLNAME").await.is_err());
        assert_eq!(watchlist.symbols(), ["AAPL"]);
        assert!(!watchlist.contains("AVERYLONGTICKERSYMBOLNAME"));
        assert_eq!(
            collection.get(WATCHLIST_KEY).await.unwrap().as_deref(),
            Some(r#"["AAPL"]"#)
        );

        // A toggle that fits still goes through
        assert!(!watchlist.toggle("AAPL").await.unwrap());
        assert!(watchlist.symbols().is_empty());
    }
}
