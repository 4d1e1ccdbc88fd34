//! In-memory price cache keyed by (symbol, date).
//!
//! Lookups forward-fill within a single day's tick series. Misses fetch
//! a multi-day calendar window through the provider, paginating until
//! the provider reports no continuation token. Each symbol records the
//! contiguous date range it has fetched; a date inside that range with
//! no series is a known gap and returns `None` without re-fetching.
//! Non-trading days inside a fetched window alias the previous trading
//! day's series so weekend lookups resolve to Friday's last price.
//!
//! Concurrency: RwLock'd maps with insert-if-absent writes. Concurrent
//! prefetch workers may race on the same window; the first insert wins
//! and later duplicates are dropped.

use super::provider::{DataError, PriceProvider, PriceTick};
use crate::calendar::TradingCalendar;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Immutable, time-sorted tick series for one trading day.
#[derive(Debug, Clone)]
pub struct DaySeries {
    ticks: Vec<PriceTick>,
}

impl DaySeries {
    fn new(mut ticks: Vec<PriceTick>) -> Self {
        ticks.sort_by_key(|t| t.time);
        Self { ticks }
    }

    /// Latest close at or before `time` (forward fill). `None` when the
    /// series has no tick at or before `time`.
    pub fn price_at(&self, time: NaiveDateTime) -> Option<f64> {
        let idx = self.ticks.partition_point(|t| t.time <= time);
        idx.checked_sub(1).map(|i| self.ticks[i].close)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Contiguous calendar-date span fetched for one symbol.
#[derive(Debug, Clone, Copy)]
struct PrefetchRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// Fetch/hit counters for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Completed provider window fetches.
    pub window_fetches: u64,
    /// Lookups answered from an already-cached day.
    pub hits: u64,
}

/// Thread-safe price cache over a paginated provider.
pub struct PriceCache {
    provider: Arc<dyn PriceProvider>,
    calendar: TradingCalendar,
    /// Calendar days fetched per miss (lookup date inclusive).
    window_days: u32,
    days: RwLock<HashMap<(String, NaiveDate), Arc<DaySeries>>>,
    ranges: RwLock<HashMap<String, PrefetchRange>>,
    window_fetches: AtomicU64,
    hits: AtomicU64,
}

impl PriceCache {
    pub fn new(provider: Arc<dyn PriceProvider>, window_days: u32) -> Self {
        Self {
            provider,
            calendar: TradingCalendar::new(),
            window_days: window_days.max(1),
            days: RwLock::new(HashMap::new()),
            ranges: RwLock::new(HashMap::new()),
            window_fetches: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Forward-filled price for `symbol` at `time`.
    ///
    /// On a cache miss outside the fetched range, fetches the window
    /// synchronously. Returns `None` for known gaps and for fetch
    /// failures (logged; the next lookup retries).
    pub fn price_at(&self, symbol: &str, time: NaiveDateTime) -> Option<f64> {
        let date = time.date();

        if let Some(series) = self.cached_series(symbol, date) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return series.price_at(time);
        }

        if self.covers(symbol, date) {
            // Known gap: the window was fetched and this day had no data.
            return None;
        }

        if let Err(e) = self.ensure_window(symbol, date) {
            log::warn!("price fetch failed for {symbol} at {date}: {e}");
            return None;
        }

        self.cached_series(symbol, date)
            .and_then(|series| series.price_at(time))
    }

    /// Make sure the fetched range for `symbol` covers `date`, fetching
    /// a window if it does not. Failures leave the range untouched so a
    /// later call retries.
    pub fn ensure_window(&self, symbol: &str, date: NaiveDate) -> Result<(), DataError> {
        let existing = self.ranges.read().expect("ranges lock").get(symbol).copied();
        let (start, end) = match existing {
            Some(range) if range.start <= date && date <= range.end => return Ok(()),
            Some(range) if date > range.end => {
                // Extension keeps the recorded range contiguous.
                let start = range.end + Duration::days(1);
                let min_end = start + Duration::days(i64::from(self.window_days) - 1);
                (start, min_end.max(date))
            }
            Some(range) => (date, range.start - Duration::days(1)),
            None => (date, date + Duration::days(i64::from(self.window_days) - 1)),
        };

        let ticks = self.fetch_all_pages(symbol, start, end)?;
        self.install_window(symbol, start, end, ticks);
        self.window_fetches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            window_fetches: self.window_fetches.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    /// Fetched [start, end] for a symbol, if any.
    pub fn coverage(&self, symbol: &str) -> Option<(NaiveDate, NaiveDate)> {
        self.ranges
            .read()
            .expect("ranges lock")
            .get(symbol)
            .map(|r| (r.start, r.end))
    }

    fn cached_series(&self, symbol: &str, date: NaiveDate) -> Option<Arc<DaySeries>> {
        self.days
            .read()
            .expect("days lock")
            .get(&(symbol.to_string(), date))
            .cloned()
    }

    fn covers(&self, symbol: &str, date: NaiveDate) -> bool {
        self.ranges
            .read()
            .expect("ranges lock")
            .get(symbol)
            .is_some_and(|r| r.start <= date && date <= r.end)
    }

    /// Drain provider pagination for one window.
    fn fetch_all_pages(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceTick>, DataError> {
        let mut ticks = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .provider
                .fetch_page(symbol, start, end, token.as_deref())?;
            ticks.extend(page.ticks);
            match page.next_page {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(ticks)
    }

    /// Bucket ticks per day, alias non-trading days to the previous
    /// trading day's series, and extend the recorded range.
    fn install_window(&self, symbol: &str, start: NaiveDate, end: NaiveDate, ticks: Vec<PriceTick>) {
        let mut by_day: HashMap<NaiveDate, Vec<PriceTick>> = HashMap::new();
        for tick in ticks {
            by_day.entry(tick.time.date()).or_default().push(tick);
        }

        let mut days = self.days.write().expect("days lock");
        let mut date = start;
        while date <= end {
            let key = (symbol.to_string(), date);
            if !days.contains_key(&key) {
                if let Some(day_ticks) = by_day.remove(&date) {
                    days.insert(key, Arc::new(DaySeries::new(day_ticks)));
                } else if !self.calendar.is_trading_day(date) {
                    // Weekend/holiday lookups resolve to the previous
                    // session's last price via a shared series.
                    let prev = self.calendar.previous_trading_day(date);
                    if let Some(prev_series) = days.get(&(symbol.to_string(), prev)).cloned() {
                        days.insert(key, prev_series);
                    }
                }
                // Trading day with no ticks stays absent: known gap.
            }
            date += Duration::days(1);
        }
        drop(days);

        let mut ranges = self.ranges.write().expect("ranges lock");
        ranges
            .entry(symbol.to_string())
            .and_modify(|r| {
                r.start = r.start.min(start);
                r.end = r.end.max(end);
            })
            .or_insert(PrefetchRange { start, end });
    }
}
