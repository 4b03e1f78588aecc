//! Quote abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cache key prefix shared by every quote entry.
pub const QUOTE_PREFIX: &str = "quote_";

pub fn quote_cache_key(symbol: &str) -> String {
    format!("{QUOTE_PREFIX}{symbol}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub change_percent: f64,
    /// When the quote was fetched, not the upstream trade time.
    pub as_of: DateTime<Utc>,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// `Ok(None)` means no quote is available right now: no credential,
    /// throttled upstream, or an incomplete payload.
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>>;

    async fn clear_quote_cache(&self, symbol: &str);

    async fn clear_all_quote_caches(&self);
}
