//! Executed orders and exit reasons.
//!
//! Orders are immutable fill records appended to the run's order log.
//! Their serde field names are the stable artifact schema consumed by
//! downstream tooling; rename with care.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Held to the configured trading-day horizon.
    TimedExit,
    /// Loss from average cost breached the stop threshold.
    StopLoss,
    /// Drawdown from the high-water mark breached the trailing threshold.
    TrailingStop,
    /// Gain from average cost reached the target.
    TakeProfit,
    /// Forced close on the final simulation step.
    BacktestEnd,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TimedExit => "timed_exit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::BacktestEnd => "backtest_end",
        }
    }
}

/// A single executed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub side: OrderSide,
    pub symbol: String,
    pub shares: u32,
    /// Reference price before slippage.
    pub requested_price: f64,
    /// Executed price after one-sided slippage.
    pub fill_price: f64,
    pub commission: f64,
    pub time: NaiveDateTime,
    /// Sells only: why the position was closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExitReason>,
    /// Sells only: realized profit net of this fill's commission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    /// Sells only: profit relative to the cost basis sold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_ratio: Option<f64>,
}

impl Order {
    /// Cash moved by this fill: negative for buys, positive for sells.
    pub fn cash_delta(&self) -> f64 {
        let gross = f64::from(self.shares) * self.fill_price;
        match self.side {
            OrderSide::Buy => -(gross + self.commission),
            OrderSide::Sell => gross - self.commission,
        }
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
    fn exit_reason_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExitReason::StopLoss).unwrap(),
            "\"stop_loss\""
        );
        assert_eq!(
            serde_json::to_string(&ExitReason::BacktestEnd).unwrap(),
            "\"backtest_end\""
        );
        assert_eq!(ExitReason::TrailingStop.as_str(), "trailing_stop");
    }

    #[test]
    fn buy_cash_delta_includes_commission() {
        let order = Order {
            side: OrderSide::Buy,
            symbol: "SPY".into(),
            shares: 10,
            requested_price: 100.0,
            fill_price: 100.1,
            commission: 1.0,
            time: t0(),
            reason: None,
            profit: None,
            profit_ratio: None,
        };
        assert!((order.cash_delta() + 1002.0).abs() < 1e-9);
    }

    #[test]
    fn sell_fields_omitted_on_buys() {
        let order = Order {
            side: OrderSide::Buy,
            symbol: "SPY".into(),
            shares: 10,
            requested_price: 100.0,
            fill_price: 100.1,
            commission: 1.0,
            time: t0(),
            reason: None,
            profit: None,
            profit_ratio: None,
        };
        let json = serde_json::to_string(&order).unwrap();
        assert!(!json.contains("reason"));
        assert!(!json.contains("profit"));
    }
}
