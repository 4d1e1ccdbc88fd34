//! Chronological simulation clock.
//!
//! Enumerates fixed-width steps (default 20 s) across the regular
//! session of every trading day in the run span. Signals are assigned
//! to steps by flooring their event time to the step width; events on
//! non-trading days or outside session hours have no step and are
//! surfaced as `outside_window` rejections by the entry pipeline.

use crate::calendar::{session_close, session_open, TradingCalendar};
use chrono::{Duration, NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    BeforeStart,
    Running,
    Finished,
}

/// Precomputed step sequence for one run.
pub struct BacktestClock {
    steps: Vec<NaiveDateTime>,
    cursor: usize,
    state: RunState,
    step_seconds: u32,
    calendar: TradingCalendar,
}

impl BacktestClock {
    /// Build the step sequence over trading days in `[start, end]`.
    pub fn new(start: NaiveDate, end: NaiveDate, step_seconds: u32, calendar: TradingCalendar) -> Self {
        let step_seconds = step_seconds.max(1);
        let open = session_open();
        let close = session_close();
        let session_len = (close - open).num_seconds();

        let mut steps = Vec::new();
        for day in calendar.trading_days_in(start, end) {
            let mut offset = 0i64;
            while offset <= session_len {
                steps.push(day.and_time(open) + Duration::seconds(offset));
                offset += i64::from(step_seconds);
            }
        }

        Self {
            steps,
            cursor: 0,
            state: RunState::BeforeStart,
            step_seconds,
            calendar,
        }
    }

    /// Advance to the next step. `None` once the sequence is exhausted,
    /// after which the state is `Finished`.
    pub fn tick(&mut self) -> Option<NaiveDateTime> {
        if self.cursor >= self.steps.len() {
            self.state = RunState::Finished;
            return None;
        }
        self.state = RunState::Running;
        let step = self.steps[self.cursor];
        self.cursor += 1;
        step.into()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// True while positioned on the last step of the sequence.
    pub fn on_final_step(&self) -> bool {
        self.cursor == self.steps.len() && !self.steps.is_empty()
    }

    pub fn steps(&self) -> &[NaiveDateTime] {
        &self.steps
    }

    /// Step an event time belongs to, flooring to the step width.
    ///
    /// `None` for non-trading days and times outside the session.
    pub fn bucket_for(&self, time: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = time.date();
        if !self.calendar.is_trading_day(date) {
            return None;
        }
        let open = date.and_time(session_open());
        let close = date.and_time(session_close());
        if time < open || time > close {
            return None;
        }
        let offset = (time - open).num_seconds();
        let floored = offset - offset % i64::from(self.step_seconds);
        Some(open + Duration::seconds(floored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        d.and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn steps_cover_session_inclusive() {
        let d = date(2024, 3, 4);
        let clock = BacktestClock::new(d, d, 20, TradingCalendar::new());
        // 6.5 hours at 20 s plus the 16:00:00 terminal step.
        assert_eq!(clock.steps().len(), 1171);
        assert_eq!(clock.steps()[0], at(d, 9, 30, 0));
        assert_eq!(*clock.steps().last().unwrap(), at(d, 16, 0, 0));
    }

    #[test]
    fn weekend_days_contribute_no_steps() {
        // Fri Mar 8 .. Mon Mar 11: two trading days.
        let clock = BacktestClock::new(date(2024, 3, 8), date(2024, 3, 11), 20, TradingCalendar::new());
        assert_eq!(clock.steps().len(), 2 * 1171);
        assert_eq!(clock.steps()[1171], at(date(2024, 3, 11), 9, 30, 0));
    }

    #[test]
    fn tick_walks_the_sequence_and_finishes() {
        let d = date(2024, 3, 4);
        let mut clock = BacktestClock::new(d, d, 3600, TradingCalendar::new());
        assert_eq!(clock.state(), RunState::BeforeStart);

        let mut count = 0;
        while clock.tick().is_some() {
            assert_eq!(clock.state(), RunState::Running);
            count += 1;
        }
        assert_eq!(count, clock.steps().len());
        assert_eq!(clock.state(), RunState::Finished);
        assert!(clock.tick().is_none());
    }

    #[test]
    fn final_step_flag() {
        let d = date(2024, 3, 4);
        let mut clock = BacktestClock::new(d, d, 23400, TradingCalendar::new());
        assert_eq!(clock.steps().len(), 2); // 09:30 and 16:00
        clock.tick();
        assert!(!clock.on_final_step());
        clock.tick();
        assert!(clock.on_final_step());
    }

    #[test]
    fn bucket_floors_to_step_width() {
        let d = date(2024, 3, 4);
        let clock = BacktestClock::new(d, d, 20, TradingCalendar::new());
        assert_eq!(clock.bucket_for(at(d, 9, 30, 19)), Some(at(d, 9, 30, 0)));
        assert_eq!(clock.bucket_for(at(d, 9, 30, 20)), Some(at(d, 9, 30, 20)));
        assert_eq!(clock.bucket_for(at(d, 16, 0, 0)), Some(at(d, 16, 0, 0)));
    }

    #[test]
    fn out_of_session_and_weekend_have_no_bucket() {
        let d = date(2024, 3, 4);
        let clock = BacktestClock::new(d, d, 20, TradingCalendar::new());
        assert_eq!(clock.bucket_for(at(d, 9, 29, 59)), None);
        assert_eq!(clock.bucket_for(at(d, 16, 0, 1)), None);
        assert_eq!(clock.bucket_for(at(date(2024, 3, 9), 10, 0, 0)), None);
    }
}
