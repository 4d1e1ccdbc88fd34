//! FlowLab Runner — orchestration around the core engine.
//!
//! Loads the TOML run configuration, adapts JSON-lines signal files
//! into engine events, drives a backtest, and exports the artifacts
//! (`result.json` plus `orders.csv`).

pub mod artifacts;
pub mod config;
pub mod runner;
pub mod signals;

pub use config::{RunConfig, SourceConfig};
pub use runner::{execute, execute_with_cache};
pub use signals::load_signals;
