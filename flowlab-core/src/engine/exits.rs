//! Position exit state machine.
//!
//! Each open position is evaluated once per step, after the caller has
//! ratcheted the high-water mark with the step's price. The first rule
//! that matches fires, in fixed priority order:
//!
//! 1. timed exit (trading-day horizon reached, at or past exit time)
//! 2. stop-loss (loss from average cost)
//! 3. trailing stop (drawdown from high-water)
//! 4. take-profit (gain from average cost)

use crate::calendar::TradingCalendar;
use crate::config::ExitConfig;
use crate::domain::{ExitReason, Position};
use chrono::NaiveDateTime;

pub struct PositionExitEngine {
    rules: ExitConfig,
    calendar: TradingCalendar,
}

impl PositionExitEngine {
    pub fn new(rules: ExitConfig, calendar: TradingCalendar) -> Self {
        Self { rules, calendar }
    }

    pub fn rules(&self) -> &ExitConfig {
        &self.rules
    }

    /// First exit rule triggered by `price` at `now`, if any.
    ///
    /// The caller updates `position.high_water` before calling; the
    /// trailing stop here must see the current step's high.
    pub fn evaluate(&self, position: &Position, price: f64, now: NaiveDateTime) -> Option<ExitReason> {
        if self.timed_exit_due(position, now) {
            return Some(ExitReason::TimedExit);
        }

        let return_ratio = position.return_ratio(price);
        if return_ratio <= -self.rules.stop_loss {
            return Some(ExitReason::StopLoss);
        }

        if let Some(trailing) = self.rules.trailing_stop {
            if position.drawdown_from_high(price) >= trailing {
                return Some(ExitReason::TrailingStop);
            }
        }

        if return_ratio >= self.rules.take_profit {
            return Some(ExitReason::TakeProfit);
        }

        None
    }

    /// Entry day counts as trading day 1; the exit is due on the Nth
    /// trading day from the configured exit time onward, or on any
    /// later day (positions held over a data gap still exit).
    fn timed_exit_due(&self, position: &Position, now: NaiveDateTime) -> bool {
        let due_date = self
            .calendar
            .nth_trading_day_from(position.entry_time.date(), self.rules.holding_days);
        now.date() > due_date || (now.date() == due_date && now.time() >= self.rules.exit_time)
    }
}
