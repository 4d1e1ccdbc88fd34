//! Core domain types: signals, positions, orders, account state.

pub mod account;
pub mod order;
pub mod position;
pub mod signal;

pub use account::AccountState;
pub use order::{ExitReason, Order, OrderSide};
pub use position::Position;
pub use signal::{FlowDirection, FlowObservation, SignalEvent};
