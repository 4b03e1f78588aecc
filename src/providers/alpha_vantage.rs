use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::cache::TtlCache;
use crate::core::quote::{QUOTE_PREFIX, Quote, QuoteProvider, quote_cache_key};

/// Parses a price or percentage that may carry `%`, `,` or `$`.
fn to_num(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s
            .replace(['%', ',', '$'], "")
            .trim()
            .parse::<f64>()
            .ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn is_set(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

#[derive(Deserialize, Debug)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<Value>,
    #[serde(rename = "Information")]
    information: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<Value>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<Value>,
}

/// Translates a `GLOBAL_QUOTE` body into a quote. Throttling notices and
/// incomplete payloads yield `None`.
fn parse_global_quote(symbol: &str, body: Value) -> Option<Quote> {
    let response: GlobalQuoteResponse = match serde_json::from_value(body) {
        Ok(response) => response,
        Err(e) => {
            debug!("Unexpected quote payload for {}: {}", symbol, e);
            return None;
        }
    };

    if is_set(&response.note) || is_set(&response.information) {
        let notice = response
            .note
            .as_ref()
            .or(response.information.as_ref())
            .map(|v| v.to_string())
            .unwrap_or_default();
        warn!("Quote API declined request for {}: {}", symbol, notice);
        return None;
    }

    let quote = response.global_quote?;
    let price = quote.price.as_ref().and_then(to_num)?;
    let change_percent = quote.change_percent.as_ref().and_then(to_num)?;

    Some(Quote {
        price,
        change_percent,
        as_of: Utc::now(),
    })
}

/// Live quotes from the Alpha Vantage `GLOBAL_QUOTE` endpoint, cached per
/// symbol. Without an API key every lookup is `None` and nothing is sent.
pub struct AlphaVantageProvider {
    base_url: String,
    api_key: Option<String>,
    ttl: Duration,
    cache: TtlCache,
    client: reqwest::Client,
}

impl AlphaVantageProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        ttl: Duration,
        cache: TtlCache,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("marketpulse/0.1")
            .build()?;
        Ok(AlphaVantageProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            ttl,
            cache,
            client,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_quote(&self, symbol: &str, api_key: &str) -> Result<Option<Quote>> {
        let url = Url::parse_with_params(
            &format!("{}/query", self.base_url),
            &[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", api_key),
            ],
        )
        .with_context(|| format!("Invalid quote endpoint: {}", self.base_url))?;
        debug!("Requesting quote for {} from {}", symbol, self.base_url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response for {symbol}"))?;

        Ok(parse_global_quote(symbol, body))
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    #[instrument(
        name = "AlphaVantageQuote",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        self.cache
            .with_cache(&quote_cache_key(symbol), Some(self.ttl), || {
                self.fetch_quote(symbol, api_key)
            })
            .await
    }

    async fn clear_quote_cache(&self, symbol: &str) {
        self.cache.delete(&quote_cache_key(symbol)).await;
    }

    async fn clear_all_quote_caches(&self) {
        for key in self.cache.keys_with_prefix(QUOTE_PREFIX).await {
            self.cache.delete(&key).await;
        }
    }
}
