//! FlowLab command-line interface.

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowlab_core::engine::RunResult;
use flowlab_runner::{execute, load_signals, RunConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flowlab", about = "Options-flow backtest runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a backtest from a TOML config and a JSON-lines signal file.
    Run {
        /// Run configuration (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Signal events, one JSON object per line.
        #[arg(long)]
        signals: PathBuf,

        /// Artifact output directory; a run-id subdirectory is created.
        #[arg(long, default_value = "runs")]
        out: PathBuf,

        /// Override the configured initial cash.
        #[arg(long)]
        cash: Option<f64>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            signals,
            out,
            cash,
        } => {
            let mut run_config = RunConfig::load(&config)?;
            if let Some(cash) = cash {
                run_config.initial_cash = cash;
            }
            let events = load_signals(&signals)?;
            let result = execute(&run_config, events, &out)?;
            print_summary(&run_config, &result);
            Ok(())
        }
    }
}

fn print_summary(config: &RunConfig, result: &RunResult) {
    let s = &result.summary;
    println!();
    println!("  initial cash     {:>14.2}", config.initial_cash);
    println!("  final cash       {:>14.2}", s.final_cash);
    println!("  position value   {:>14.2}", s.position_value);
    println!("  total assets     {:>14.2}", s.total_assets);
    println!("  realized P&L     {:>14.2}", s.realized_pnl);
    println!("  total return     {:>13.2}%", s.total_return * 100.0);
    println!("  buys / sells     {:>8} / {}", s.buy_count, s.sell_count);
    if !s.exit_reasons.is_empty() {
        let mut reasons: Vec<_> = s.exit_reasons.iter().collect();
        reasons.sort_by_key(|(r, _)| r.as_str());
        println!("  exits:");
        for (reason, count) in reasons {
            println!("    {:<16} {count}", reason.as_str());
        }
    }
}
