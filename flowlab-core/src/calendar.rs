//! NYSE trading-day calendar.
//!
//! Weekends plus computed US market holidays. Good Friday is derived from
//! the Gregorian Easter computus; fixed-date holidays observe the usual
//! Friday/Monday shift when they land on a weekend.
//!
//! All engine time arithmetic (holding periods, blacklist windows, timed
//! exits) goes through this calendar so that "days" always means exchange
//! trading days, never calendar days.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

/// Regular session open, exchange-local time.
pub fn session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).expect("valid session open")
}

/// Regular session close, exchange-local time.
pub fn session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).expect("valid session close")
}

/// NYSE-approximation trading-day calendar.
///
/// Stateless; cheap to copy around. Holiday sets are computed per year on
/// demand rather than tabulated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TradingCalendar;

impl TradingCalendar {
    pub fn new() -> Self {
        Self
    }

    /// True if the exchange holds a regular session on `date`.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// First trading day strictly after `date`.
    pub fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date + Duration::days(1);
        while !self.is_trading_day(d) {
            d += Duration::days(1);
        }
        d
    }

    /// Last trading day strictly before `date`.
    pub fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date - Duration::days(1);
        while !self.is_trading_day(d) {
            d -= Duration::days(1);
        }
        d
    }

    /// Count of trading days in `[start, end]`, inclusive on both ends.
    ///
    /// Returns 0 when `start > end`.
    pub fn trading_days_between(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        if start > end {
            return 0;
        }
        self.trading_days_in(start, end).count() as u32
    }

    /// The `n`th trading day counting `from` as day 1 (when `from` itself
    /// is a trading day; otherwise counting starts at the next one).
    ///
    /// This is the timed-exit date arithmetic: a position entered on day 1
    /// with a 6-day holding period exits on the 6th trading day.
    pub fn nth_trading_day_from(&self, from: NaiveDate, n: u32) -> NaiveDate {
        debug_assert!(n > 0, "nth_trading_day_from requires n >= 1");
        let mut d = from;
        let mut count = 0u32;
        loop {
            if self.is_trading_day(d) {
                count += 1;
                if count >= n {
                    return d;
                }
            }
            d += Duration::days(1);
        }
    }

    /// Iterator over trading days in `[start, end]` in ascending order.
    pub fn trading_days_in(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = NaiveDate> + '_ {
        start
            .iter_days()
            .take_while(move |d| *d <= end)
            .filter(move |d| self.is_trading_day(*d))
    }

    fn is_holiday(&self, date: NaiveDate) -> bool {
        let year = date.year();
        holidays_for_year(year).contains(&date)
    }
}

/// Full-day market closures for one year.
fn holidays_for_year(year: i32) -> Vec<NaiveDate> {
    let mut days = vec![
        observed(ymd(year, 1, 1)),                      // New Year's Day
        nth_weekday(year, 1, Weekday::Mon, 3),          // MLK Day
        nth_weekday(year, 2, Weekday::Mon, 3),          // Washington's Birthday
        easter_sunday(year) - Duration::days(2),        // Good Friday
        last_weekday(year, 5, Weekday::Mon),            // Memorial Day
        observed(ymd(year, 7, 4)),                      // Independence Day
        nth_weekday(year, 9, Weekday::Mon, 1),          // Labor Day
        nth_weekday(year, 11, Weekday::Thu, 4),         // Thanksgiving
        observed(ymd(year, 12, 25)),                    // Christmas
    ];
    // Juneteenth became a full market closure in 2022.
    if year >= 2022 {
        days.push(observed(ymd(year, 6, 19)));
    }
    days
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid holiday date")
}

/// Weekend-observation shift: Saturday holidays observe Friday, Sunday
/// holidays observe Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// The `n`th given weekday of a month (1-based).
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let mut d = ymd(year, month, 1);
    let mut count = 0;
    loop {
        if d.weekday() == weekday {
            count += 1;
            if count == n {
                return d;
            }
        }
        d += Duration::days(1);
    }
}

/// The last given weekday of a month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let first_next = if month == 12 {
        ymd(year + 1, 1, 1)
    } else {
        ymd(year, month + 1, 1)
    };
    let mut d = first_next - Duration::days(1);
    while d.weekday() != weekday {
        d -= Duration::days(1);
    }
    d
}

/// Gregorian Easter Sunday (anonymous computus).
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekends_are_not_trading_days() {
        let cal = TradingCalendar::new();
        assert!(!cal.is_trading_day(date(2024, 3, 2))); // Saturday
        assert!(!cal.is_trading_day(date(2024, 3, 3))); // Sunday
        assert!(cal.is_trading_day(date(2024, 3, 4))); // Monday
    }

    #[test]
    fn fixed_holidays_observed() {
        let cal = TradingCalendar::new();
        // July 4 2021 fell on a Sunday; observed Monday July 5.
        assert!(!cal.is_trading_day(date(2021, 7, 5)));
        // Christmas 2021 fell on a Saturday; observed Friday Dec 24.
        assert!(!cal.is_trading_day(date(2021, 12, 24)));
        assert!(!cal.is_trading_day(date(2024, 12, 25)));
    }

    #[test]
    fn floating_holidays() {
        let cal = TradingCalendar::new();
        assert!(!cal.is_trading_day(date(2024, 1, 15))); // MLK
        assert!(!cal.is_trading_day(date(2024, 5, 27))); // Memorial Day
        assert!(!cal.is_trading_day(date(2024, 9, 2))); // Labor Day
        assert!(!cal.is_trading_day(date(2024, 11, 28))); // Thanksgiving
        assert!(!cal.is_trading_day(date(2024, 6, 19))); // Juneteenth
        // Juneteenth pre-2022 was a normal session.
        assert!(cal.is_trading_day(date(2020, 6, 19)));
    }

    #[test]
    fn good_friday_from_computus() {
        let cal = TradingCalendar::new();
        assert_eq!(easter_sunday(2024), date(2024, 3, 31));
        assert!(!cal.is_trading_day(date(2024, 3, 29)));
        assert_eq!(easter_sunday(2023), date(2023, 4, 9));
        assert!(!cal.is_trading_day(date(2023, 4, 7)));
    }

    #[test]
    fn next_and_previous_skip_weekend() {
        let cal = TradingCalendar::new();
        assert_eq!(cal.next_trading_day(date(2024, 3, 1)), date(2024, 3, 4));
        assert_eq!(cal.previous_trading_day(date(2024, 3, 4)), date(2024, 3, 1));
    }

    #[test]
    fn trading_days_between_inclusive() {
        let cal = TradingCalendar::new();
        // Mon..Fri of a holiday-free week.
        assert_eq!(cal.trading_days_between(date(2024, 3, 4), date(2024, 3, 8)), 5);
        // Across a weekend.
        assert_eq!(cal.trading_days_between(date(2024, 3, 8), date(2024, 3, 11)), 2);
        // Inverted range.
        assert_eq!(cal.trading_days_between(date(2024, 3, 8), date(2024, 3, 4)), 0);
    }

    #[test]
    fn nth_trading_day_counts_entry_as_first() {
        let cal = TradingCalendar::new();
        // Entry Monday, 6 trading days -> the following Monday.
        assert_eq!(
            cal.nth_trading_day_from(date(2024, 3, 4), 6),
            date(2024, 3, 11)
        );
        assert_eq!(cal.nth_trading_day_from(date(2024, 3, 4), 1), date(2024, 3, 4));
        // Entry on a Saturday starts counting Monday.
        assert_eq!(cal.nth_trading_day_from(date(2024, 3, 2), 1), date(2024, 3, 4));
    }
}
