//! Typed backtest configuration with serde defaults and fail-fast
//! validation.
//!
//! Deserialized from TOML by the runner. Every threshold the engine
//! consults lives here; the engine itself holds no magic numbers.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("initial cash must be positive, got {0}")]
    NonPositiveCash(f64),

    #[error("entry window {index} is inverted: {start} >= {end}")]
    InvertedWindow {
        index: usize,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("premium divisor must be positive, got {0}")]
    NonPositiveDivisor(f64),

    #[error("position ratio cap must be in (0, 1], got {0}")]
    BadPositionCap(f64),

    #[error("holding period must be at least 1 trading day")]
    ZeroHoldingDays,

    #[error("{name} must be positive, got {value}")]
    NonPositiveThreshold { name: &'static str, value: f64 },

    #[error("slippage must be in [0, 1), got {0}")]
    BadSlippage(f64),

    #[error("prefetch worker count must be at least 1")]
    ZeroWorkers,

    #[error("step width must be at least 1 second")]
    ZeroStep,
}

/// One intraday entry window, inclusive start, exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TradingWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// Entry-filter thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Intraday windows in which entries are allowed.
    pub windows: Vec<TradingWindow>,
    /// Minimum sweep premium in USD.
    pub min_premium: f64,
    /// Signal premium must exceed mean context premium times this.
    /// Zero disables the filter.
    pub historical_premium_multiplier: f64,
    /// Veto when same-day prior bearish premium exceeds this. Zero
    /// disables the veto.
    pub max_daily_short_premium: f64,
    /// Bearish prints below this premium are ignored by the veto.
    pub short_flow_premium_floor: f64,
    /// Trading days a symbol stays blacklisted after a buy.
    pub blacklist_days: u32,
    /// Maximum accepted entries per simulation day. Zero disables.
    pub max_daily_trades: u32,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            windows: vec![TradingWindow {
                start: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
                end: NaiveTime::from_hms_opt(16, 0, 0).expect("valid time"),
            }],
            min_premium: 500_000.0,
            historical_premium_multiplier: 0.0,
            max_daily_short_premium: 0.0,
            short_flow_premium_floor: 100_000.0,
            blacklist_days: 3,
            max_daily_trades: 0,
        }
    }
}

/// Position-sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Premium is divided by this to produce the target asset ratio.
    pub premium_divisor: f64,
    /// Cap on a single position's asset ratio.
    pub max_single_position: f64,
    /// Cap on aggregate open-position value as a ratio of total assets.
    pub max_total_position: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            premium_divisor: 2_000_000.0,
            max_single_position: 0.4,
            max_total_position: 1.0,
        }
    }
}

/// Exit-rule thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Trading-day holding horizon; entry day counts as day 1.
    pub holding_days: u32,
    /// Earliest time-of-day the timed exit fires on the horizon day.
    pub exit_time: NaiveTime,
    /// Loss fraction from average cost that triggers the stop.
    pub stop_loss: f64,
    /// Gain fraction from average cost that triggers the target.
    pub take_profit: f64,
    /// Drawdown fraction from the high-water mark; `None` disables.
    pub trailing_stop: Option<f64>,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            holding_days: 6,
            exit_time: NaiveTime::from_hms_opt(15, 0, 0).expect("valid time"),
            stop_loss: 0.1,
            take_profit: 0.2,
            trailing_stop: None,
        }
    }
}

/// Execution friction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// One-sided slippage fraction applied against the trade.
    pub slippage: f64,
    pub commission_per_share: f64,
    pub min_commission: f64,
    /// Reject buys that would push cash / total assets below this.
    pub cash_floor: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            slippage: 0.001,
            commission_per_share: 0.005,
            min_commission: 1.0,
            cash_floor: -1.0,
        }
    }
}

/// Data-layer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Calendar days fetched per cache-miss window.
    pub prefetch_days: u32,
    /// Prefetch worker threads.
    pub workers: usize,
    /// Simulation step width in seconds.
    pub step_seconds: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            prefetch_days: 6,
            workers: 5,
            step_seconds: 20,
        }
    }
}

/// Full engine configuration for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub entry: EntryConfig,
    pub sizing: SizingConfig,
    pub exit: ExitConfig,
    pub costs: CostConfig,
    pub data: DataConfig,
}

impl BacktestConfig {
    /// Reject impossible configurations before the clock starts.
    pub fn validate(&self, initial_cash: f64) -> Result<(), ConfigError> {
        if initial_cash <= 0.0 {
            return Err(ConfigError::NonPositiveCash(initial_cash));
        }
        for (index, w) in self.entry.windows.iter().enumerate() {
            if w.start >= w.end {
                return Err(ConfigError::InvertedWindow {
                    index,
                    start: w.start,
                    end: w.end,
                });
            }
        }
        if self.sizing.premium_divisor <= 0.0 {
            return Err(ConfigError::NonPositiveDivisor(self.sizing.premium_divisor));
        }
        if !(0.0..=1.0).contains(&self.sizing.max_single_position)
            || self.sizing.max_single_position == 0.0
        {
            return Err(ConfigError::BadPositionCap(self.sizing.max_single_position));
        }
        if !(0.0..=1.0).contains(&self.sizing.max_total_position)
            || self.sizing.max_total_position == 0.0
        {
            return Err(ConfigError::BadPositionCap(self.sizing.max_total_position));
        }
        if self.exit.holding_days == 0 {
            return Err(ConfigError::ZeroHoldingDays);
        }
        if self.exit.stop_loss <= 0.0 {
            return Err(ConfigError::NonPositiveThreshold {
                name: "stop_loss",
                value: self.exit.stop_loss,
            });
        }
        if self.exit.take_profit <= 0.0 {
            return Err(ConfigError::NonPositiveThreshold {
                name: "take_profit",
                value: self.exit.take_profit,
            });
        }
        if let Some(trailing) = self.exit.trailing_stop {
            if trailing <= 0.0 {
                return Err(ConfigError::NonPositiveThreshold {
                    name: "trailing_stop",
                    value: trailing,
                });
            }
        }
        if !(0.0..1.0).contains(&self.costs.slippage) {
            return Err(ConfigError::BadSlippage(self.costs.slippage));
        }
        if self.data.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.data.step_seconds == 0 {
            return Err(ConfigError::ZeroStep);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = BacktestConfig::default();
        assert!(config.validate(1_000_000.0).is_ok());
    }

    #[test]
    fn rejects_non_positive_cash() {
        let config = BacktestConfig::default();
        assert!(matches!(
            config.validate(0.0),
            Err(ConfigError::NonPositiveCash(_))
        ));
    }

    #[test]
    fn rejects_inverted_window() {
        let mut config = BacktestConfig::default();
        config.entry.windows = vec![TradingWindow {
            start: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        }];
        assert!(matches!(
            config.validate(1_000_000.0),
            Err(ConfigError::InvertedWindow { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_zero_divisor_and_workers() {
        let mut config = BacktestConfig::default();
        config.sizing.premium_divisor = 0.0;
        assert!(config.validate(1_000_000.0).is_err());

        let mut config = BacktestConfig::default();
        config.data.workers = 0;
        assert!(matches!(
            config.validate(1_000_000.0),
            Err(ConfigError::ZeroWorkers)
        ));
    }

    #[test]
    fn window_contains_is_half_open() {
        let w = TradingWindow {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        };
        assert!(w.contains(NaiveTime::from_hms_opt(9, 30, 0).unwrap()));
        assert!(w.contains(NaiveTime::from_hms_opt(10, 59, 59).unwrap()));
        assert!(!w.contains(NaiveTime::from_hms_opt(11, 0, 0).unwrap()));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: BacktestConfig = toml::from_str(
            r#"
            [entry]
            min_premium = 750000.0

            [exit]
            holding_days = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.entry.min_premium, 750_000.0);
        assert_eq!(config.exit.holding_days, 4);
        assert_eq!(config.data.prefetch_days, 6);
        assert_eq!(config.data.step_seconds, 20);
    }
}
