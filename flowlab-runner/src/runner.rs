//! Wires provider, cache, and engine into a complete run.

use crate::artifacts::write_artifacts;
use crate::config::RunConfig;
use anyhow::{Context, Result};
use flowlab_core::data::{AggsProvider, PriceCache};
use flowlab_core::domain::SignalEvent;
use flowlab_core::engine::{BacktestRun, RunResult};
use std::path::Path;
use std::sync::Arc;

/// Run a backtest against an already-built cache.
///
/// The entry point for tests and embedders that bring their own
/// provider; `execute` builds the HTTP stack on top of this.
pub fn execute_with_cache(
    config: &RunConfig,
    cache: Arc<PriceCache>,
    signals: Vec<SignalEvent>,
) -> Result<RunResult> {
    config
        .engine
        .validate(config.initial_cash)
        .context("invalid run configuration")?;
    let run = BacktestRun::new(config.engine.clone(), cache)
        .context("failed to construct backtest run")?;
    Ok(run.run(config.initial_cash, signals))
}

/// Run a backtest end to end and write artifacts into
/// `out_dir/<run_id>/`.
pub fn execute(config: &RunConfig, signals: Vec<SignalEvent>, out_dir: &Path) -> Result<RunResult> {
    let api_key = std::env::var(&config.source.api_key_env).with_context(|| {
        format!(
            "API key environment variable {} is not set",
            config.source.api_key_env
        )
    })?;
    let provider = AggsProvider::new(config.source.base_url.clone(), api_key)
        .context("failed to build price provider")?;
    let cache = Arc::new(PriceCache::new(
        Arc::new(provider),
        config.engine.data.prefetch_days,
    ));

    let result = execute_with_cache(config, cache, signals)?;

    let run_id = config.run_id()?;
    let run_dir = out_dir.join(&run_id);
    write_artifacts(&run_dir, &result)?;
    log::info!(
        "run {run_id}: return {:.2}%, {} buys / {} sells",
        result.summary.total_return * 100.0,
        result.summary.buy_count,
        result.summary.sell_count
    );
    Ok(result)
}
