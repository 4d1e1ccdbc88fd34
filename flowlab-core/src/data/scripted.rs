//! Scripted in-memory price provider for tests and dry runs.
//!
//! Holds a fixed tick series per symbol and serves it through the same
//! paginated interface as the HTTP provider, so cache pagination and
//! fetch-once behavior can be exercised without a network.

use super::provider::{DataError, PricePage, PriceProvider, PriceTick};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic provider backed by preloaded ticks.
pub struct ScriptedProvider {
    ticks: HashMap<String, Vec<PriceTick>>,
    /// Maximum ticks per page; small values force pagination.
    page_size: usize,
    fetch_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            ticks: HashMap::new(),
            page_size: usize::MAX,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Load ticks for a symbol. Ticks are kept sorted by time.
    pub fn add_ticks(&mut self, symbol: &str, mut ticks: Vec<PriceTick>) {
        ticks.sort_by_key(|t| t.time);
        self.ticks.entry(symbol.to_string()).or_default().extend(ticks);
        if let Some(all) = self.ticks.get_mut(symbol) {
            all.sort_by_key(|t| t.time);
        }
    }

    /// Number of `fetch_page` calls served so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::Relaxed)
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_page(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<PricePage, DataError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);

        let all = self
            .ticks
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let in_range: Vec<PriceTick> = all
            .iter()
            .filter(|t| t.time.date() >= start && t.time.date() <= end)
            .copied()
            .collect();

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| DataError::Other(format!("bad page token: {token}")))?,
            None => 0,
        };

        let page: Vec<PriceTick> = in_range
            .iter()
            .skip(offset)
            .take(self.page_size)
            .copied()
            .collect();
        let next_offset = offset + page.len();
        let next_page = (next_offset < in_range.len()).then(|| next_offset.to_string());

        Ok(PricePage {
            ticks: page,
            next_page,
        })
    }
}
