//! HTTP aggregate-bars price provider.
//!
//! Fetches second-resolution aggregate bars from a REST API shaped like
//! the common market-data vendors: JSON results array plus an opaque
//! `next_url` continuation link when the response is truncated. The
//! pagination token round-trips through the cache untouched.

use super::provider::{DataError, PricePage, PriceProvider, PriceTick};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;

/// Aggregate-bars API response.
#[derive(Debug, Deserialize)]
struct AggsResponse {
    results: Option<Vec<AggsBar>>,
    status: Option<String>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggsBar {
    /// Bar start, Unix milliseconds UTC.
    t: i64,
    /// Bar close price.
    c: f64,
}

/// HTTP price provider for second-bar aggregates.
pub struct AggsProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    /// UTC offset of exchange-local time, in hours (negative for US/Eastern).
    utc_offset_hours: i64,
}

impl AggsProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            utc_offset_hours: -4,
        })
    }

    /// Override the exchange-local UTC offset (default −4, US/Eastern DST).
    pub fn with_utc_offset_hours(mut self, hours: i64) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    /// Build the first-page URL for a symbol and date range.
    fn range_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/v2/aggs/ticker/{symbol}/range/1/second/{start}/{end}\
             ?adjusted=true&sort=asc&limit=50000",
            self.base_url
        )
    }

    /// Convert response bars to exchange-local ticks.
    fn parse_response(&self, symbol: &str, resp: AggsResponse) -> Result<PricePage, DataError> {
        if let Some(status) = &resp.status {
            if status == "NOT_FOUND" {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if status != "OK" && status != "DELAYED" {
                return Err(DataError::ResponseFormatChanged(format!(
                    "unexpected status '{status}' for {symbol}"
                )));
            }
        }

        let bars = resp.results.unwrap_or_default();
        let mut ticks = Vec::with_capacity(bars.len());
        for bar in bars {
            let utc = DateTime::from_timestamp_millis(bar.t).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {}", bar.t))
            })?;
            let local = utc.naive_utc() + chrono::Duration::hours(self.utc_offset_hours);
            ticks.push(PriceTick {
                time: local,
                close: bar.c,
            });
        }

        Ok(PricePage {
            ticks,
            next_page: resp.next_url,
        })
    }
}

impl PriceProvider for AggsProvider {
    fn name(&self) -> &str {
        "aggs_http"
    }

    fn fetch_page(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<PricePage, DataError> {
        // Continuation links are complete URLs; only the key is appended.
        let url = match page_token {
            Some(token) => token.to_string(),
            None => self.range_url(symbol, start, end),
        };

        let resp = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    DataError::NetworkUnreachable(e.to_string())
                } else {
                    DataError::Other(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        let parsed: AggsResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        self.parse_response(symbol, parsed)
    }
}
