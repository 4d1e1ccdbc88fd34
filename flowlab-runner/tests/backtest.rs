//! End-to-end backtest scenarios over a scripted provider.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use flowlab_core::config::TradingWindow;
use flowlab_core::data::provider::PriceTick;
use flowlab_core::data::{PriceCache, ScriptedProvider};
use flowlab_core::domain::{ExitReason, OrderSide, SignalEvent};
use flowlab_runner::{execute_with_cache, RunConfig};
use std::sync::Arc;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    date(d).and_hms_opt(h, m, 0).unwrap()
}

/// One tick per minute across the session at a fixed price.
fn flat_day(ticks: &mut Vec<PriceTick>, d: u32, price: f64) {
    ramp_day(ticks, d, |_| price);
}

fn ramp_day(ticks: &mut Vec<PriceTick>, d: u32, price_at_minute: impl Fn(u32) -> f64) {
    for minute in 0..390u32 {
        let h = 9 + (30 + minute) / 60;
        let m = (30 + minute) % 60;
        ticks.push(PriceTick {
            time: at(d, h, m),
            close: price_at_minute(minute),
        });
    }
}

fn frictionless_config() -> RunConfig {
    let mut config = RunConfig {
        initial_cash: 1_000_000.0,
        ..Default::default()
    };
    config.engine.entry.windows = vec![TradingWindow {
        start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    }];
    config.engine.entry.min_premium = 500_000.0;
    config.engine.entry.blacklist_days = 0;
    config.engine.costs.slippage = 0.0;
    config.engine.costs.commission_per_share = 0.0;
    config.engine.costs.min_commission = 0.0;
    config.engine.data.step_seconds = 60;
    config.engine.data.workers = 1;
    config
}

fn signal(symbol: &str, d: u32, h: u32, m: u32, premium: f64, price: f64) -> SignalEvent {
    SignalEvent {
        symbol: symbol.into(),
        premium,
        stock_price: price,
        time: at(d, h, m),
        context: Vec::new(),
    }
}

fn build_cache(ticks: Vec<(&str, Vec<PriceTick>)>, window_days: u32) -> Arc<PriceCache> {
    let mut provider = ScriptedProvider::new();
    for (symbol, t) in ticks {
        provider.add_ticks(symbol, t);
    }
    Arc::new(PriceCache::new(Arc::new(provider), window_days))
}

#[test]
fn premium_sizing_respects_divisor_and_cap() {
    let mut aapl = Vec::new();
    flat_day(&mut aapl, 4, 100.0);
    let mut nvda = Vec::new();
    flat_day(&mut nvda, 4, 100.0);

    let config = frictionless_config();
    let cache = build_cache(vec![("AAPL", aapl), ("NVDA", nvda)], 6);
    let result = execute_with_cache(
        &config,
        cache,
        vec![
            // 600k / 2M divisor: 30% of 1M assets at 100 -> 3000 shares.
            signal("AAPL", 4, 10, 0, 600_000.0, 100.0),
            // 800k / 2M hits the 40% single-position cap -> 4000 shares.
            signal("NVDA", 4, 10, 30, 800_000.0, 100.0),
        ],
    )
    .unwrap();

    let buys: Vec<_> = result
        .orders
        .iter()
        .filter(|o| o.side == OrderSide::Buy)
        .collect();
    assert_eq!(buys.len(), 2);
    assert_eq!(buys[0].symbol, "AAPL");
    assert_eq!(buys[0].shares, 3_000);
    assert_eq!(buys[1].symbol, "NVDA");
    assert_eq!(buys[1].shares, 4_000);
}

#[test]
fn single_position_cap_clamps_raw_premium_ratio() {
    // 600k / 800k divisor would be 75% of assets; the 40% single cap
    // clamps it to 40,000 notional on a 100k account -> 400 shares.
    let mut ticks = Vec::new();
    flat_day(&mut ticks, 4, 100.0);

    let mut config = frictionless_config();
    config.initial_cash = 100_000.0;
    config.engine.sizing.premium_divisor = 800_000.0;
    let cache = build_cache(vec![("AAPL", ticks)], 6);
    let result = execute_with_cache(
        &config,
        cache,
        vec![signal("AAPL", 4, 10, 0, 600_000.0, 100.0)],
    )
    .unwrap();

    let buy = result
        .orders
        .iter()
        .find(|o| o.side == OrderSide::Buy)
        .unwrap();
    assert_eq!(buy.shares, 400);
    assert_eq!(buy.fill_price, 100.0);
}

#[test]
fn stop_loss_wins_over_later_take_profit() {
    // Crash to -15% at 11:00, then a rally past +20% by 14:00. The stop
    // fires first and the position never re-enters to catch the rally.
    let mut ticks = Vec::new();
    ramp_day(&mut ticks, 4, |minute| {
        if minute < 90 {
            100.0
        } else if minute < 180 {
            85.0
        } else {
            130.0
        }
    });

    let mut config = frictionless_config();
    config.engine.entry.blacklist_days = 3;
    let cache = build_cache(vec![("AAPL", ticks)], 6);
    let result = execute_with_cache(
        &config,
        cache,
        vec![signal("AAPL", 4, 10, 0, 600_000.0, 100.0)],
    )
    .unwrap();

    assert_eq!(result.summary.sell_count, 1);
    assert_eq!(result.summary.exit_reasons[&ExitReason::StopLoss], 1);
    assert!(!result
        .summary
        .exit_reasons
        .contains_key(&ExitReason::TakeProfit));
    let sell = result
        .orders
        .iter()
        .find(|o| o.side == OrderSide::Sell)
        .unwrap();
    assert_eq!(sell.fill_price, 85.0);
    assert_eq!(sell.time, at(4, 11, 0));
}

#[test]
fn holding_past_prefetch_window_extends_coverage() {
    // Entry Monday Mar 4; a 6-calendar-day window covers through Sat
    // Mar 9. A 7-trading-day hold must exit on Tue Mar 12, so the cache
    // has to extend its fetched range past the first window.
    let mut ticks = Vec::new();
    for d in [4, 5, 6, 7, 8, 11, 12] {
        flat_day(&mut ticks, d, 100.0);
    }

    let mut config = frictionless_config();
    config.engine.exit.holding_days = 7;
    config.engine.exit.exit_time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

    let cache = build_cache(vec![("AAPL", ticks)], 6);
    let result = execute_with_cache(
        &config,
        cache.clone(),
        vec![
            signal("AAPL", 4, 10, 0, 600_000.0, 100.0),
            // Span stretcher; too small to trade.
            signal("AAPL", 12, 15, 30, 1_000.0, 100.0),
        ],
    )
    .unwrap();

    assert_eq!(result.summary.exit_reasons[&ExitReason::TimedExit], 1);
    let sell = result
        .orders
        .iter()
        .find(|o| o.side == OrderSide::Sell)
        .unwrap();
    assert_eq!(sell.time, at(12, 15, 0));

    let (start, end) = cache.coverage("AAPL").unwrap();
    assert_eq!(start, date(4));
    assert!(end >= date(12));
}

#[test]
fn forced_close_leaves_no_open_positions() {
    let mut aapl = Vec::new();
    flat_day(&mut aapl, 4, 100.0);
    let mut nvda = Vec::new();
    flat_day(&mut nvda, 4, 50.0);

    let config = frictionless_config();
    let cache = build_cache(vec![("AAPL", aapl), ("NVDA", nvda)], 6);
    let result = execute_with_cache(
        &config,
        cache,
        vec![
            signal("AAPL", 4, 10, 0, 600_000.0, 100.0),
            signal("NVDA", 4, 11, 0, 600_000.0, 50.0),
        ],
    )
    .unwrap();

    assert_eq!(result.summary.buy_count, result.summary.sell_count);
    assert_eq!(result.summary.exit_reasons[&ExitReason::BacktestEnd], 2);
    assert_eq!(result.summary.position_value, 0.0);
    assert!((result.summary.total_assets - result.summary.final_cash).abs() < 1e-9);
}

#[test]
fn artifacts_round_trip_from_disk() {
    let mut ticks = Vec::new();
    flat_day(&mut ticks, 4, 100.0);
    let config = frictionless_config();
    let cache = build_cache(vec![("AAPL", ticks)], 6);
    let result = execute_with_cache(
        &config,
        cache,
        vec![signal("AAPL", 4, 10, 0, 600_000.0, 100.0)],
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    flowlab_runner::artifacts::write_artifacts(dir.path(), &result).unwrap();

    let raw = std::fs::read_to_string(dir.path().join("result.json")).unwrap();
    let reread: flowlab_core::engine::RunResult = serde_json::from_str(&raw).unwrap();
    assert_eq!(reread.orders.len(), result.orders.len());
    assert_eq!(reread.summary.buy_count, 1);

    let tape = std::fs::read_to_string(dir.path().join("orders.csv")).unwrap();
    let mut lines = tape.lines();
    assert!(lines.next().unwrap().starts_with("time,side,symbol"));
    assert_eq!(lines.count(), result.orders.len());
}
