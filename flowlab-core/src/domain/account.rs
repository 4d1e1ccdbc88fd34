//! Account state: cash plus open positions.

use super::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cash and open positions for one simulated account.
///
/// Mutated only by the execution simulator; everything else reads it.
/// The map holds OPEN positions only — closed positions are removed and
/// survive as sell orders in the order log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub cash: f64,
    pub positions: HashMap<String, Position>,
}

impl AccountState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            positions: HashMap::new(),
        }
    }

    /// Cash plus mark-to-market value of open positions.
    ///
    /// Symbols missing from `prices` are valued at average entry cost,
    /// the same carry-forward used for data gaps.
    pub fn total_assets(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.position_value(prices)
    }

    /// Mark-to-market value of all open positions.
    pub fn position_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.avg_entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn total_assets_marks_to_market() {
        let mut account = AccountState::new(50_000.0);
        let t = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        account
            .positions
            .insert("AAPL".into(), Position::open("AAPL".into(), 100, 190.0, t));

        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 200.0);
        assert!((account.total_assets(&prices) - 70_000.0).abs() < 1e-9);

        // Missing price falls back to entry cost.
        assert!((account.total_assets(&HashMap::new()) - 69_000.0).abs() < 1e-9);
    }

    #[test]
    fn holds_reports_open_positions() {
        let account = AccountState::new(10_000.0);
        assert!(!account.holds("TSLA"));
    }
}
