//! Simulation engine: clock, execution, exit rules, entry filters, and
//! the run driver that wires them together.

pub mod clock;
pub mod execution;
pub mod exits;
pub mod filters;
pub mod run;

pub use clock::{BacktestClock, RunState};
pub use execution::{CostModel, ExecutionSimulator, MarketClient};
pub use exits::PositionExitEngine;
pub use filters::{EntryContext, EntryDecision, EntryFilterPipeline, RejectReason};
pub use run::{BacktestRun, RunResult, RunSummary, SignalRecord};
