//! Long equity positions with high-water tracking.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A long stock position.
///
/// Lifecycle is held by the account map: an entry exists while the
/// position is open and is removed when the last share is sold.
///
/// `high_water` is the highest price observed since entry, ratcheted on
/// every mark-to-market and never below `avg_entry_price`. The trailing
/// stop measures drawdown from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u32,
    pub avg_entry_price: f64,
    /// Time of the first fill that opened the position.
    pub entry_time: NaiveDateTime,
    pub high_water: f64,
}

impl Position {
    pub fn open(symbol: String, shares: u32, fill_price: f64, time: NaiveDateTime) -> Self {
        Self {
            symbol,
            shares,
            avg_entry_price: fill_price,
            entry_time: time,
            high_water: fill_price,
        }
    }

    /// Fold an additional fill into the position at weighted-average cost.
    pub fn add_shares(&mut self, shares: u32, fill_price: f64) {
        let old_cost = self.avg_entry_price * f64::from(self.shares);
        let new_cost = fill_price * f64::from(shares);
        self.shares += shares;
        self.avg_entry_price = (old_cost + new_cost) / f64::from(self.shares);
        if fill_price > self.high_water {
            self.high_water = fill_price;
        }
    }

    /// Ratchet the high-water mark. Never decreases.
    pub fn observe_price(&mut self, price: f64) {
        if price > self.high_water {
            self.high_water = price;
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        f64::from(self.shares) * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        f64::from(self.shares) * (price - self.avg_entry_price)
    }

    /// Fractional return at `price` relative to average cost.
    pub fn return_ratio(&self, price: f64) -> f64 {
        (price - self.avg_entry_price) / self.avg_entry_price
    }

    /// Drawdown from the high-water mark, as a non-negative fraction.
    pub fn drawdown_from_high(&self, price: f64) -> f64 {
        if self.high_water <= 0.0 {
            return 0.0;
        }
        ((self.high_water - price) / self.high_water).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn open_initializes_high_water_at_entry() {
        let pos = Position::open("AAPL".into(), 100, 190.0, t0());
        assert_eq!(pos.high_water, 190.0);
        assert_eq!(pos.avg_entry_price, 190.0);
    }

    #[test]
    fn weighted_average_cost() {
        let mut pos = Position::open("AAPL".into(), 100, 100.0, t0());
        pos.add_shares(100, 110.0);
        assert_eq!(pos.shares, 200);
        assert!((pos.avg_entry_price - 105.0).abs() < 1e-10);
    }

    #[test]
    fn high_water_only_ratchets_up() {
        let mut pos = Position::open("AAPL".into(), 100, 100.0, t0());
        pos.observe_price(120.0);
        pos.observe_price(95.0);
        assert_eq!(pos.high_water, 120.0);
        assert!((pos.drawdown_from_high(108.0) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn drawdown_never_negative() {
        let mut pos = Position::open("AAPL".into(), 100, 100.0, t0());
        pos.observe_price(110.0);
        assert_eq!(pos.drawdown_from_high(115.0), 0.0);
    }

    #[test]
    fn return_ratio_signed() {
        let pos = Position::open("AAPL".into(), 10, 200.0, t0());
        assert!((pos.return_ratio(220.0) - 0.1).abs() < 1e-10);
        assert!((pos.return_ratio(180.0) + 0.1).abs() < 1e-10);
    }
}
