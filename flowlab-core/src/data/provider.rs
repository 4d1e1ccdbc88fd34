//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over intraday price sources (HTTP
//! aggregate-bars API, scripted fixtures for tests) so the cache layer
//! can swap implementations. Providers return one page at a time; the
//! cache drives pagination until no next-page token remains.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One intraday price observation (bar close).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Exchange-local naive time of the bar.
    pub time: NaiveDateTime,
    pub close: f64,
}

/// One page of ticks from a provider.
#[derive(Debug, Clone)]
pub struct PricePage {
    pub ticks: Vec<PriceTick>,
    /// Opaque continuation token; `None` when the page is the last.
    pub next_page: Option<String>,
}

/// Structured error types for data operations.
///
/// Provider errors are treated as data gaps by callers, never as fatal
/// run errors: a failed fetch is retried on a later step.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("pagination truncated for {symbol}: {detail}")]
    PaginationTruncated { symbol: String, detail: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for intraday price providers.
///
/// The cache layer sits above this trait — providers know nothing about
/// caching or prefetch ranges.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch one page of ticks for `symbol` over `[start, end]` calendar
    /// days. `page_token` is `None` for the first page, otherwise the
    /// token from the previous page.
    fn fetch_page(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<PricePage, DataError>;
}
