//! Order execution simulator.
//!
//! The only place `AccountState` is mutated. Fills apply one-sided
//! slippage against the trade and a per-share commission with a
//! minimum. Rejected orders are complete no-ops: no cash moves, no
//! position changes, nothing is appended to the order log.

use crate::config::CostConfig;
use crate::domain::{AccountState, ExitReason, Order, OrderSide, Position};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Execution friction: slippage plus commission.
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub slippage: f64,
    pub commission_per_share: f64,
    pub min_commission: f64,
}

impl CostModel {
    pub fn from_config(costs: &CostConfig) -> Self {
        Self {
            slippage: costs.slippage,
            commission_per_share: costs.commission_per_share,
            min_commission: costs.min_commission,
        }
    }

    /// Frictionless preset for tests.
    pub fn frictionless() -> Self {
        Self {
            slippage: 0.0,
            commission_per_share: 0.0,
            min_commission: 0.0,
        }
    }

    /// Buys fill above the reference price.
    pub fn buy_fill(&self, reference: f64) -> f64 {
        reference * (1.0 + self.slippage)
    }

    /// Sells fill below the reference price.
    pub fn sell_fill(&self, reference: f64) -> f64 {
        reference * (1.0 - self.slippage)
    }

    pub fn commission(&self, shares: u32) -> f64 {
        (self.commission_per_share * f64::from(shares)).max(self.min_commission)
    }
}

/// Narrow broker seam: price marking, account access, and order entry.
///
/// The engine drives whichever implementation it is handed and never
/// branches on identity; a live-trading adapter implements the same
/// surface. Only the simulated implementation lives in this crate.
pub trait MarketClient {
    fn account(&self) -> &AccountState;

    fn mark(&mut self, symbol: &str, price: f64);

    fn buy(
        &mut self,
        symbol: &str,
        shares: u32,
        reference_price: f64,
        time: NaiveDateTime,
        prices: &HashMap<String, f64>,
    ) -> Option<Order>;

    fn sell(
        &mut self,
        symbol: &str,
        shares: u32,
        reference_price: f64,
        time: NaiveDateTime,
        reason: ExitReason,
    ) -> Option<Order>;
}

/// Simulated broker: account bookkeeping plus the order log.
pub struct ExecutionSimulator {
    account: AccountState,
    costs: CostModel,
    /// Minimum allowed post-trade cash / total-assets ratio.
    cash_floor: f64,
}

impl ExecutionSimulator {
    pub fn new(initial_cash: f64, costs: CostModel, cash_floor: f64) -> Self {
        Self {
            account: AccountState::new(initial_cash),
            costs,
            cash_floor,
        }
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Ratchet a position's high-water mark with a step price.
    pub fn mark(&mut self, symbol: &str, price: f64) {
        if let Some(position) = self.account.positions.get_mut(symbol) {
            position.observe_price(price);
        }
    }

    /// Open or extend a long position.
    ///
    /// Rejects when the post-trade cash ratio would fall below the
    /// floor. An existing position is extended at weighted-average
    /// cost. Returns the fill, or `None` on rejection.
    pub fn buy(
        &mut self,
        symbol: &str,
        shares: u32,
        reference_price: f64,
        time: NaiveDateTime,
        prices: &HashMap<String, f64>,
    ) -> Option<Order> {
        if shares == 0 || reference_price <= 0.0 {
            return None;
        }

        let fill_price = self.costs.buy_fill(reference_price);
        let commission = self.costs.commission(shares);
        let cost = f64::from(shares) * fill_price + commission;

        let post_cash = self.account.cash - cost;
        let post_assets =
            post_cash + self.account.position_value(prices) + f64::from(shares) * fill_price;
        if post_assets > 0.0 && post_cash / post_assets < self.cash_floor {
            log::debug!(
                "buy {shares} {symbol} rejected: cash ratio {:.3} below floor {:.3}",
                post_cash / post_assets,
                self.cash_floor
            );
            return None;
        }

        match self.account.positions.get_mut(symbol) {
            Some(position) => position.add_shares(shares, fill_price),
            None => {
                self.account.positions.insert(
                    symbol.to_string(),
                    Position::open(symbol.to_string(), shares, fill_price, time),
                );
            }
        }
        self.account.cash = post_cash;

        Some(Order {
            side: OrderSide::Buy,
            symbol: symbol.to_string(),
            shares,
            requested_price: reference_price,
            fill_price,
            commission,
            time,
            reason: None,
            profit: None,
            profit_ratio: None,
        })
    }

    /// Close some or all of a position.
    ///
    /// Selling more shares than held is an invariant violation upstream
    /// and rejected as a no-op. Realized profit nets out this fill's
    /// commission; the buy-side commission was already paid from cash.
    pub fn sell(
        &mut self,
        symbol: &str,
        shares: u32,
        reference_price: f64,
        time: NaiveDateTime,
        reason: ExitReason,
    ) -> Option<Order> {
        if shares == 0 || reference_price <= 0.0 {
            return None;
        }
        let held = match self.account.positions.get(symbol) {
            Some(position) => position.shares,
            None => {
                log::warn!("sell {shares} {symbol} rejected: no open position");
                return None;
            }
        };
        if shares > held {
            log::warn!("sell {shares} {symbol} rejected: only {held} held");
            return None;
        }

        let fill_price = self.costs.sell_fill(reference_price);
        let commission = self.costs.commission(shares);
        let avg_cost = self.account.positions[symbol].avg_entry_price;

        let proceeds = f64::from(shares) * fill_price - commission;
        let profit = f64::from(shares) * (fill_price - avg_cost) - commission;
        let basis = avg_cost * f64::from(shares);
        let profit_ratio = if basis > 0.0 { profit / basis } else { 0.0 };

        self.account.cash += proceeds;
        if shares == held {
            self.account.positions.remove(symbol);
        } else if let Some(position) = self.account.positions.get_mut(symbol) {
            position.shares -= shares;
        }

        Some(Order {
            side: OrderSide::Sell,
            symbol: symbol.to_string(),
            shares,
            requested_price: reference_price,
            fill_price,
            commission,
            time,
            reason: Some(reason),
            profit: Some(profit),
            profit_ratio: Some(profit_ratio),
        })
    }
}

impl MarketClient for ExecutionSimulator {
    fn account(&self) -> &AccountState {
        ExecutionSimulator::account(self)
    }

    fn mark(&mut self, symbol: &str, price: f64) {
        ExecutionSimulator::mark(self, symbol, price);
    }

    fn buy(
        &mut self,
        symbol: &str,
        shares: u32,
        reference_price: f64,
        time: NaiveDateTime,
        prices: &HashMap<String, f64>,
    ) -> Option<Order> {
        ExecutionSimulator::buy(self, symbol, shares, reference_price, time, prices)
    }

    fn sell(
        &mut self,
        symbol: &str,
        shares: u32,
        reference_price: f64,
        time: NaiveDateTime,
        reason: ExitReason,
    ) -> Option<Order> {
        ExecutionSimulator::sell(self, symbol, shares, reference_price, time, reason)
    }
}
