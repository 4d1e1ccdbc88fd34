//! Concurrent window prefetcher over a bounded worker pool.
//!
//! Runs `PriceCache::ensure_window` for many symbols in parallel on a
//! private rayon pool so prefetch bursts never starve the global pool.
//! Per-symbol failures are logged and isolated; one bad symbol never
//! aborts the batch.

use super::cache::PriceCache;
use super::provider::DataError;
use chrono::NaiveDate;
use rayon::ThreadPoolBuilder;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_WORKERS: usize = 5;

pub struct Prefetcher {
    pool: rayon::ThreadPool,
}

impl Prefetcher {
    pub fn new(workers: usize) -> Result<Self, DataError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("prefetch-{i}"))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build prefetch pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Ensure each symbol's window covering `date` is cached.
    ///
    /// Blocks until every symbol has been attempted. Returns the number
    /// of symbols that failed; each failure is logged at warn level.
    pub fn prefetch(&self, cache: &PriceCache, symbols: &[String], date: NaiveDate) -> usize {
        let failures = AtomicUsize::new(0);
        self.pool.scope(|scope| {
            for symbol in symbols {
                let failures = &failures;
                scope.spawn(move |_| {
                    if let Err(e) = cache.ensure_window(symbol, date) {
                        log::warn!("prefetch failed for {symbol} from {date}: {e}");
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        failures.load(Ordering::Relaxed)
    }
}
