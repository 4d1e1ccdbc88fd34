//! Signal events and their attached options-flow context.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction of a single options-flow print.
///
/// The upstream parser maps aggressive call buying (ASK-CALL / BID-PUT)
/// to `Bullish` and aggressive put buying (ASK-PUT / BID-CALL) to
/// `Bearish` before events reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    Bullish,
    Bearish,
}

/// One historical options-flow print attached to a signal as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowObservation {
    /// Exchange-local naive time of the print.
    pub time: NaiveDateTime,
    /// Total premium of the print in USD.
    pub premium: f64,
    pub direction: FlowDirection,
}

/// An entry candidate produced by the upstream flow parser.
///
/// Immutable once constructed; the engine never mutates signals, it only
/// accepts or rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: String,
    /// Premium of the triggering sweep in USD.
    pub premium: f64,
    /// Stock price observed by the parser at signal time. Used as the
    /// reference price fallback when the cache has no tick yet.
    pub stock_price: f64,
    /// Exchange-local naive event time.
    pub time: NaiveDateTime,
    /// Same-day flow context for this symbol, parser-supplied.
    #[serde(default)]
    pub context: Vec<FlowObservation>,
}

impl SignalEvent {
    /// Sum of bearish context premiums strictly before the signal time,
    /// counting only prints at or above `floor`.
    pub fn prior_bearish_premium(&self, floor: f64) -> f64 {
        self.context
            .iter()
            .filter(|o| {
                o.direction == FlowDirection::Bearish && o.time < self.time && o.premium >= floor
            })
            .map(|o| o.premium)
            .sum()
    }

    /// Mean premium of the context prints, or `None` with no context.
    pub fn mean_context_premium(&self) -> Option<f64> {
        if self.context.is_empty() {
            return None;
        }
        let sum: f64 = self.context.iter().map(|o| o.premium).sum();
        Some(sum / self.context.len() as f64)
    }
}
