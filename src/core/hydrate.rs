//! Sequential, staggered quote fetching across a watchlist

use super::quote::{Quote, QuoteProvider};
use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one pass over the watchlist.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HydrationReport {
    pub applied: usize,
    pub absent: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Fetches a quote for every symbol in order and hands each one to `apply`.
///
/// The symbol at position `i` waits `stagger * i` before its request, to
/// stay under the upstream per-minute limit. Failures are logged and
/// skipped. Once `cancel` fires no further requests start, and a quote that
/// arrives after cancellation is dropped.
pub async fn hydrate<F>(
    provider: &dyn QuoteProvider,
    symbols: &[String],
    stagger: Duration,
    cancel: &CancellationToken,
    mut apply: F,
) -> HydrationReport
where
    F: FnMut(&str, &Quote),
{
    let mut report = HydrationReport::default();

    for (i, symbol) in symbols.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let delay = stagger.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX));
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let result = provider.get_quote(symbol).await;
        if cancel.is_cancelled() {
            debug!("Discarding quote for {} after cancellation", symbol);
            report.cancelled = true;
            break;
        }

        match result {
            Ok(Some(quote)) => {
                apply(symbol, &quote);
                report.applied += 1;
            }
            Ok(None) => {
                debug!("No quote available for {}", symbol);
                report.absent += 1;
            }
            Err(e) => {
                warn!("Failed to fetch quote for {}: {:#}", symbol, e);
                report.failed += 1;
            }
        }
    }

    info!(?report, "Hydration pass finished");
    report
}

/// Drops every cached quote, then hydrates so each symbol hits the network.
pub async fn refresh<F>(
    provider: &dyn QuoteProvider,
    symbols: &[String],
    stagger: Duration,
    cancel: &CancellationToken,
    apply: F,
) -> HydrationReport
where
    F: FnMut(&str, &Quote),
{
    provider.clear_all_quote_caches().await;
    hydrate(provider, symbols, stagger, cancel, apply).await
}

/// Like [`refresh`], but only clears and refetches the given symbols.
pub async fn refresh_symbols<F>(
    provider: &dyn QuoteProvider,
    symbols: &[String],
    stagger: Duration,
    cancel: &CancellationToken,
    apply: F,
) -> HydrationReport
where
    F: FnMut(&str, &Quote),
{
    join_all(symbols.iter().map(|s| provider.clear_quote_cache(s))).await;
    hydrate(provider, symbols, stagger, cancel, apply).await
}
