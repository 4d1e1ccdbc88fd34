//! Run artifact export.
//!
//! `result.json` is the full run artifact; `orders.csv` is a flat
//! order tape beside it for spreadsheet use.

use anyhow::{Context, Result};
use flowlab_core::domain::{Order, OrderSide};
use flowlab_core::engine::RunResult;
use serde::Serialize;
use std::path::Path;

/// One row of the order tape.
#[derive(Debug, Serialize)]
struct OrderRow<'a> {
    time: String,
    side: &'static str,
    symbol: &'a str,
    shares: u32,
    requested_price: f64,
    fill_price: f64,
    commission: f64,
    reason: &'a str,
    profit: Option<f64>,
    profit_ratio: Option<f64>,
}

impl<'a> OrderRow<'a> {
    fn from_order(order: &'a Order) -> Self {
        Self {
            time: order.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            side: match order.side {
                OrderSide::Buy => "buy",
                OrderSide::Sell => "sell",
            },
            symbol: &order.symbol,
            shares: order.shares,
            requested_price: order.requested_price,
            fill_price: order.fill_price,
            commission: order.commission,
            reason: order.reason.map(|r| r.as_str()).unwrap_or(""),
            profit: order.profit,
            profit_ratio: order.profit_ratio,
        }
    }
}

/// Write `result.json` and `orders.csv` into `out_dir`.
pub fn write_artifacts(out_dir: &Path, result: &RunResult) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let json_path = out_dir.join("result.json");
    let json = serde_json::to_string_pretty(result).context("failed to serialize run result")?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    let csv_path = out_dir.join("orders.csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;
    for order in &result.orders {
        writer
            .serialize(OrderRow::from_order(order))
            .context("failed to write order row")?;
    }
    writer.flush().context("failed to flush order tape")?;

    log::info!(
        "wrote {} and {} ({} orders)",
        json_path.display(),
        csv_path.display(),
        result.orders.len()
    );
    Ok(())
}
