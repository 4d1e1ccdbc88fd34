//! FlowLab Core — options-flow backtest engine.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (signals, flow observations, positions, orders, account)
//! - NYSE trading-day calendar with computed holidays
//! - Price cache with forward-fill lookups and windowed prefetch
//! - Chronological clock stepping 09:30–16:00 in fixed increments
//! - Order execution simulator (slippage, commission, cash bookkeeping)
//! - Position exit state machine (timed / stop / trailing / take-profit)
//! - Ordered entry filter pipeline with audited reject reasons

pub mod calendar;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
