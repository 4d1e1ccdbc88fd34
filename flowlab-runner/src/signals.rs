//! JSON-lines signal file adapter.
//!
//! One `SignalEvent` per line, timestamps already exchange-local. The
//! upstream flow parser produces these files; this adapter only
//! validates and orders them.

use anyhow::{bail, Context, Result};
use flowlab_core::domain::SignalEvent;
use std::path::Path;

/// Load and time-order a JSON-lines signal file.
///
/// Blank lines are skipped; a malformed line fails the load with its
/// line number rather than silently dropping signals.
pub fn load_signals(path: &Path) -> Result<Vec<SignalEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read signals {}", path.display()))?;
    parse_signals(&raw).with_context(|| format!("in signals file {}", path.display()))
}

fn parse_signals(raw: &str) -> Result<Vec<SignalEvent>> {
    let mut signals = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let signal: SignalEvent = serde_json::from_str(line)
            .with_context(|| format!("malformed signal on line {}", index + 1))?;
        if signal.symbol.is_empty() {
            bail!("empty symbol on line {}", index + 1);
        }
        if !(signal.premium.is_finite() && signal.premium >= 0.0) {
            bail!("bad premium on line {}", index + 1);
        }
        signals.push(signal);
    }
    signals.sort_by(|a, b| a.time.cmp(&b.time));
    Ok(signals)
}
