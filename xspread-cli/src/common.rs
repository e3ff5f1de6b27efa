//! Shared CLI argument parsing, logging, and summary printing for the
//! `xspread` binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xspread_core::BacktestResult;

/// CLI arguments for a local file-backed backtest run.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// One snapshot file (newline-delimited JSON) per input stream,
    /// typically one per venue.
    #[arg(required = true)]
    pub snapshot_files: Vec<std::path::PathBuf>,

    /// Optional JSON file holding a `BacktestConfig`.
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Optional path to write the full `BacktestResult` as JSON.
    #[arg(short, long)]
    pub output: Option<std::path::PathBuf>,

    /// Log level.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    pub json_logs: bool,
}

/// Initialize tracing/logging.
pub fn init_logging(level: &str, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

/// Log a human-readable summary of a finished run.
pub fn print_summary(result: &BacktestResult) {
    let stats = &result.statistics;
    tracing::info!("=== Backtest Summary ===");
    tracing::info!("Snapshots processed: {}", result.snapshots_processed);
    tracing::info!(
        "Run window: {} -> {}",
        result.run_start,
        result.run_end
    );
    tracing::info!("Total trades: {}", stats.total_trades);
    tracing::info!(
        "Winners/Losers/Break-even: {}/{}/{}",
        stats.winners,
        stats.losers,
        stats.break_even
    );
    tracing::info!("Win rate: {:.2}%", stats.win_rate_pct);
    tracing::info!("Gross PnL: {}", stats.gross_pnl);
    tracing::info!("Total fees: {}", stats.total_fees);
    tracing::info!("Net PnL: {}", stats.net_pnl);
    tracing::info!("Max drawdown: {} ({:.2}%)", stats.max_drawdown, stats.max_drawdown_pct);

    if let Some(pf) = stats.profit_factor {
        tracing::info!("Profit factor: {:.2}", pf);
    }
    if let Some(sharpe) = stats.sharpe_ratio {
        tracing::info!("Sharpe ratio: {:.3}", sharpe);
    }
    if let Some(sortino) = stats.sortino_ratio {
        tracing::info!("Sortino ratio: {:.3}", sortino);
    }
}
