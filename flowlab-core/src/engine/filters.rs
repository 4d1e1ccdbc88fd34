//! Entry filter pipeline.
//!
//! Ordered and short-circuiting: a signal passes every gate or is
//! rejected with the first failing gate's reason. The reasons form the
//! stable vocabulary of the signal audit trail.

use crate::calendar::TradingCalendar;
use crate::config::{EntryConfig, SizingConfig};
use crate::domain::{AccountState, SignalEvent};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a signal was rejected. Serialized snake_case into the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Event time has no simulation step or falls outside the entry
    /// windows.
    OutsideWindow,
    /// Signal is from a different day than the simulation step.
    StaleSignal,
    PremiumTooSmall,
    /// Premium does not clear the mean context premium multiple.
    HistoricalPremium,
    /// Same-day prior bearish flow above the veto threshold.
    ShortFlow,
    /// Symbol bought within the blacklist horizon.
    Blacklisted,
    DailyCap,
    AlreadyHeld,
    /// No cache price for the symbol at this step.
    NoMarketData,
    /// Sized to zero shares at the reference price.
    ZeroShares,
    /// Aggregate open-position value would exceed the cap.
    PositionCap,
    InsufficientCash,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::OutsideWindow => "outside_window",
            RejectReason::StaleSignal => "stale_signal",
            RejectReason::PremiumTooSmall => "premium_too_small",
            RejectReason::HistoricalPremium => "historical_premium",
            RejectReason::ShortFlow => "short_flow",
            RejectReason::Blacklisted => "blacklisted",
            RejectReason::DailyCap => "daily_cap",
            RejectReason::AlreadyHeld => "already_held",
            RejectReason::NoMarketData => "no_market_data",
            RejectReason::ZeroShares => "zero_shares",
            RejectReason::PositionCap => "position_cap",
            RejectReason::InsufficientCash => "insufficient_cash",
        }
    }
}

/// Accepted entry, ready for the execution simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision {
    pub symbol: String,
    pub shares: u32,
    /// Reference price the sizing used.
    pub limit_price: f64,
    /// Target asset ratio the sizing produced.
    pub ratio: f64,
}

/// Read-only view of run state the pipeline consults.
pub struct EntryContext<'a> {
    pub account: &'a AccountState,
    /// Cache price at the step. `None` rejects the signal: a symbol
    /// without market data trades zero times.
    pub current_price: Option<f64>,
    /// Marks for total-asset valuation.
    pub prices: &'a HashMap<String, f64>,
    /// Symbol -> date of the most recent buy.
    pub blacklist: &'a HashMap<String, NaiveDate>,
    /// Entries already accepted today.
    pub daily_trades: u32,
    pub now: NaiveDateTime,
}

pub struct EntryFilterPipeline {
    entry: EntryConfig,
    sizing: SizingConfig,
    /// Minimum post-trade cash / total-assets ratio, mirrored from the
    /// cost config so rejections carry a reason instead of a silent
    /// simulator no-op.
    cash_floor: f64,
    calendar: TradingCalendar,
}

impl EntryFilterPipeline {
    pub fn new(
        entry: EntryConfig,
        sizing: SizingConfig,
        cash_floor: f64,
        calendar: TradingCalendar,
    ) -> Self {
        Self {
            entry,
            sizing,
            cash_floor,
            calendar,
        }
    }

    pub fn evaluate(
        &self,
        signal: &SignalEvent,
        ctx: &EntryContext<'_>,
    ) -> Result<EntryDecision, RejectReason> {
        let in_window = self
            .entry
            .windows
            .iter()
            .any(|w| w.contains(signal.time.time()));
        if !in_window {
            return Err(RejectReason::OutsideWindow);
        }

        if signal.time.date() != ctx.now.date() {
            return Err(RejectReason::StaleSignal);
        }

        if signal.premium < self.entry.min_premium {
            return Err(RejectReason::PremiumTooSmall);
        }

        // Fail-open with no context: an absent history never vetoes.
        if self.entry.historical_premium_multiplier > 0.0 {
            if let Some(mean) = signal.mean_context_premium() {
                if signal.premium < mean * self.entry.historical_premium_multiplier {
                    return Err(RejectReason::HistoricalPremium);
                }
            }
        }

        if self.entry.max_daily_short_premium > 0.0 {
            let bearish = signal.prior_bearish_premium(self.entry.short_flow_premium_floor);
            if bearish > self.entry.max_daily_short_premium {
                return Err(RejectReason::ShortFlow);
            }
        }

        if let Some(&buy_date) = ctx.blacklist.get(&signal.symbol) {
            let elapsed = self.calendar.trading_days_between(buy_date, ctx.now.date());
            if elapsed <= self.entry.blacklist_days {
                return Err(RejectReason::Blacklisted);
            }
        }

        if self.entry.max_daily_trades > 0 && ctx.daily_trades >= self.entry.max_daily_trades {
            return Err(RejectReason::DailyCap);
        }

        if ctx.account.holds(&signal.symbol) {
            return Err(RejectReason::AlreadyHeld);
        }

        // The signal's own stock price is a sanity reference, never a
        // fill reference.
        let Some(price) = ctx.current_price else {
            return Err(RejectReason::NoMarketData);
        };
        if price <= 0.0 {
            return Err(RejectReason::ZeroShares);
        }

        let ratio = (signal.premium / self.sizing.premium_divisor)
            .min(self.sizing.max_single_position);
        let assets = ctx.account.total_assets(ctx.prices);
        let shares = ((assets * ratio) / price).floor();
        if shares < 1.0 {
            return Err(RejectReason::ZeroShares);
        }
        let shares = shares as u32;

        let open_value = ctx.account.position_value(ctx.prices);
        let new_value = open_value + f64::from(shares) * price;
        if assets > 0.0 && new_value / assets > self.sizing.max_total_position {
            return Err(RejectReason::PositionCap);
        }

        let post_cash = ctx.account.cash - f64::from(shares) * price;
        if assets > 0.0 && post_cash / assets < self.cash_floor {
            return Err(RejectReason::InsufficientCash);
        }

        Ok(EntryDecision {
            symbol: signal.symbol.clone(),
            shares,
            limit_price: price,
            ratio,
        })
    }
}
