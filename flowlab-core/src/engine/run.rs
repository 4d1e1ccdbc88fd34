//! Backtest run driver.
//!
//! Wires the clock, cache, execution simulator, exit engine, and entry
//! pipeline into one chronological pass over the signal span. Per step:
//! mark-to-market and high-water update, then exits over all open
//! positions, then entries for the step's signals in arrival order. On
//! the final step every open position is force-closed at its last known
//! price.

use crate::calendar::TradingCalendar;
use crate::config::BacktestConfig;
use crate::data::{DataError, Prefetcher, PriceCache};
use crate::domain::{ExitReason, Order, OrderSide, SignalEvent};
use crate::engine::clock::BacktestClock;
use crate::engine::execution::{CostModel, ExecutionSimulator};
use crate::engine::exits::PositionExitEngine;
use crate::engine::filters::{EntryContext, EntryFilterPipeline, RejectReason};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Audit outcome for one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SignalOutcome {
    Accepted { shares: u32, ratio: f64 },
    Rejected { reason: RejectReason },
}

/// One entry in the signal audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub symbol: String,
    pub time: NaiveDateTime,
    pub premium: f64,
    #[serde(flatten)]
    pub outcome: SignalOutcome,
}

/// Summary metrics for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub final_cash: f64,
    pub position_value: f64,
    pub total_assets: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_return: f64,
    pub buy_count: u32,
    pub sell_count: u32,
    pub exit_reasons: HashMap<ExitReason, u32>,
}

/// Complete run artifact: order log, signal audit trail, summary.
///
/// The serde schema is stable; downstream tooling parses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_cash: f64,
    pub orders: Vec<Order>,
    pub signals: Vec<SignalRecord>,
    pub summary: RunSummary,
}

/// One backtest over a signal set.
pub struct BacktestRun {
    config: BacktestConfig,
    cache: Arc<PriceCache>,
    prefetcher: Prefetcher,
    calendar: TradingCalendar,
}

impl BacktestRun {
    pub fn new(config: BacktestConfig, cache: Arc<PriceCache>) -> Result<Self, DataError> {
        let prefetcher = Prefetcher::new(config.data.workers)?;
        Ok(Self {
            config,
            cache,
            prefetcher,
            calendar: TradingCalendar::new(),
        })
    }

    /// Drive the simulation over `signals` and produce the artifact.
    pub fn run(&self, initial_cash: f64, mut signals: Vec<SignalEvent>) -> RunResult {
        signals.sort_by(|a, b| a.time.cmp(&b.time));

        let Some(span) = signal_span(&signals) else {
            return empty_result(initial_cash);
        };
        let (start, end) = span;
        log::info!(
            "backtest over {start}..{end}: {} signals, {} initial cash",
            signals.len(),
            initial_cash
        );

        self.bulk_prefetch(&signals);

        let mut clock =
            BacktestClock::new(start, end, self.config.data.step_seconds, self.calendar);
        let mut simulator = ExecutionSimulator::new(
            initial_cash,
            CostModel::from_config(&self.config.costs),
            self.config.costs.cash_floor,
        );
        let exit_engine = PositionExitEngine::new(self.config.exit.clone(), self.calendar);
        let pipeline = EntryFilterPipeline::new(
            self.config.entry.clone(),
            self.config.sizing.clone(),
            self.config.costs.cash_floor,
            self.calendar,
        );

        let mut records: Vec<SignalRecord> = Vec::with_capacity(signals.len());
        let mut buckets: HashMap<NaiveDateTime, Vec<SignalEvent>> = HashMap::new();
        for signal in signals {
            match clock.bucket_for(signal.time) {
                Some(step) => buckets.entry(step).or_default().push(signal),
                None => {
                    log::warn!(
                        "signal for {} at {} outside simulation session",
                        signal.symbol,
                        signal.time
                    );
                    records.push(reject_record(&signal, RejectReason::OutsideWindow));
                }
            }
        }

        let mut orders: Vec<Order> = Vec::new();
        let mut prices: HashMap<String, f64> = HashMap::new();
        let mut blacklist: HashMap<String, NaiveDate> = HashMap::new();
        let mut daily_trades: u32 = 0;
        let mut current_day: Option<NaiveDate> = None;

        while let Some(now) = clock.tick() {
            if current_day != Some(now.date()) {
                current_day = Some(now.date());
                daily_trades = 0;
            }

            // Mark-to-market all open positions, ratcheting high-water.
            // `fresh` holds only this step's quotes; `prices` keeps
            // last-known marks for valuation and the final force close.
            let mut open: Vec<String> = simulator.account().positions.keys().cloned().collect();
            open.sort();
            let mut fresh: HashMap<String, f64> = HashMap::new();
            for symbol in &open {
                if let Some(price) = self.cache.price_at(symbol, now) {
                    prices.insert(symbol.clone(), price);
                    simulator.mark(symbol, price);
                    fresh.insert(symbol.clone(), price);
                }
            }

            // Exit evaluation over positions quoted this step.
            for symbol in &open {
                let Some(position) = simulator.account().positions.get(symbol) else {
                    continue;
                };
                let Some(&price) = fresh.get(symbol) else {
                    // Data gap: hold and retry next step.
                    continue;
                };
                let shares = position.shares;
                if shares == 0 {
                    log::debug!("skipping exit for {symbol}: zero sellable shares");
                    continue;
                }
                if let Some(reason) = exit_engine.evaluate(position, price, now) {
                    if let Some(order) = simulator.sell(symbol, shares, price, now, reason) {
                        log::info!(
                            "exit {symbol} x{shares} at {:.2} ({})",
                            order.fill_price,
                            reason.as_str()
                        );
                        orders.push(order);
                    }
                }
            }

            // Entries for this step's signals.
            if let Some(step_signals) = buckets.remove(&now) {
                for signal in step_signals {
                    let current_price = self.cache.price_at(&signal.symbol, now);
                    let decision = {
                        let ctx = EntryContext {
                            account: simulator.account(),
                            current_price,
                            prices: &prices,
                            blacklist: &blacklist,
                            daily_trades,
                            now,
                        };
                        pipeline.evaluate(&signal, &ctx)
                    };
                    match decision {
                        Ok(decision) => {
                            match simulator.buy(
                                &decision.symbol,
                                decision.shares,
                                decision.limit_price,
                                now,
                                &prices,
                            ) {
                                Some(order) => {
                                    log::info!(
                                        "entry {} x{} at {:.2} (ratio {:.2})",
                                        order.symbol,
                                        order.shares,
                                        order.fill_price,
                                        decision.ratio
                                    );
                                    prices.insert(decision.symbol.clone(), decision.limit_price);
                                    blacklist.insert(decision.symbol.clone(), now.date());
                                    daily_trades += 1;
                                    orders.push(order);
                                    records.push(SignalRecord {
                                        symbol: signal.symbol.clone(),
                                        time: signal.time,
                                        premium: signal.premium,
                                        outcome: SignalOutcome::Accepted {
                                            shares: decision.shares,
                                            ratio: decision.ratio,
                                        },
                                    });
                                }
                                None => {
                                    records.push(reject_record(
                                        &signal,
                                        RejectReason::InsufficientCash,
                                    ));
                                }
                            }
                        }
                        Err(reason) => records.push(reject_record(&signal, reason)),
                    }
                }
            }

            if clock.on_final_step() {
                self.force_close(&mut simulator, &prices, now, &mut orders);
            }
        }

        records.sort_by(|a, b| a.time.cmp(&b.time));
        finish(initial_cash, orders, records, &simulator, &prices)
    }

    /// Warm the cache for every symbol before the clock starts, grouped
    /// by each symbol's first signal date.
    fn bulk_prefetch(&self, signals: &[SignalEvent]) {
        let mut first_date: HashMap<NaiveDate, Vec<String>> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        for signal in signals {
            if seen.insert(signal.symbol.clone()) {
                first_date
                    .entry(signal.time.date())
                    .or_default()
                    .push(signal.symbol.clone());
            }
        }
        for (date, symbols) in first_date {
            let failed = self.prefetcher.prefetch(&self.cache, &symbols, date);
            if failed > 0 {
                log::warn!("{failed}/{} prefetches failed for {date}", symbols.len());
            }
        }
    }

    /// Close every open position at its last known price.
    fn force_close(
        &self,
        simulator: &mut ExecutionSimulator,
        prices: &HashMap<String, f64>,
        now: NaiveDateTime,
        orders: &mut Vec<Order>,
    ) {
        let mut open: Vec<(String, u32, f64)> = simulator
            .account()
            .positions
            .values()
            .map(|p| {
                let price = prices.get(&p.symbol).copied().unwrap_or(p.avg_entry_price);
                (p.symbol.clone(), p.shares, price)
            })
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0));

        for (symbol, shares, price) in open {
            if let Some(order) =
                simulator.sell(&symbol, shares, price, now, ExitReason::BacktestEnd)
            {
                log::info!("forced close {symbol} x{shares} at {:.2}", order.fill_price);
                orders.push(order);
            }
        }
    }
}

fn signal_span(signals: &[SignalEvent]) -> Option<(NaiveDate, NaiveDate)> {
    let first = signals.first()?.time.date();
    let last = signals.last()?.time.date();
    Some((first, last))
}

fn reject_record(signal: &SignalEvent, reason: RejectReason) -> SignalRecord {
    SignalRecord {
        symbol: signal.symbol.clone(),
        time: signal.time,
        premium: signal.premium,
        outcome: SignalOutcome::Rejected { reason },
    }
}

fn empty_result(initial_cash: f64) -> RunResult {
    RunResult {
        initial_cash,
        orders: Vec::new(),
        signals: Vec::new(),
        summary: RunSummary {
            final_cash: initial_cash,
            position_value: 0.0,
            total_assets: initial_cash,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_return: 0.0,
            buy_count: 0,
            sell_count: 0,
            exit_reasons: HashMap::new(),
        },
    }
}

fn finish(
    initial_cash: f64,
    orders: Vec<Order>,
    signals: Vec<SignalRecord>,
    simulator: &ExecutionSimulator,
    prices: &HashMap<String, f64>,
) -> RunResult {
    let account = simulator.account();
    let position_value = account.position_value(prices);
    let total_assets = account.cash + position_value;

    let realized_pnl: f64 = orders.iter().filter_map(|o| o.profit).sum();
    let unrealized_pnl: f64 = account
        .positions
        .values()
        .map(|p| {
            let price = prices.get(&p.symbol).copied().unwrap_or(p.avg_entry_price);
            p.unrealized_pnl(price)
        })
        .sum();

    let buy_count = orders.iter().filter(|o| o.side == OrderSide::Buy).count() as u32;
    let sell_count = orders.iter().filter(|o| o.side == OrderSide::Sell).count() as u32;
    let mut exit_reasons: HashMap<ExitReason, u32> = HashMap::new();
    for order in &orders {
        if let Some(reason) = order.reason {
            *exit_reasons.entry(reason).or_insert(0) += 1;
        }
    }

    RunResult {
        initial_cash,
        orders,
        signals,
        summary: RunSummary {
            final_cash: account.cash,
            position_value,
            total_assets,
            realized_pnl,
            unrealized_pnl,
            total_return: (total_assets - initial_cash) / initial_cash,
            buy_count,
            sell_count,
            exit_reasons,
        },
    }
}
