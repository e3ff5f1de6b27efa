//! `xspread` — run a local, file-backed cross-exchange spread backtest.
//!
//! Wires a `FileBackedPlaybackSource` over the given snapshot files to the
//! `xspread_core` engine, honors Ctrl-C as a snapshot-boundary cancellation
//! signal, and prints a summary when the run finishes.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::{init_logging, print_summary, CliArgs};
use xspread_core::{
    default_fee_table, BacktestConfig, Driver, FeeSchedule, FileBackedPlaybackSource, NullObserver,
    PlaybackFilter,
};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(&args.log_level, args.json_logs)?;

    let config = load_config(&args)?;
    let fee_schedules = load_fee_schedules(&config)?;

    let filter = PlaybackFilter {
        venues: (!config.venues.is_empty())
            .then(|| config.venues.iter().cloned().collect()),
        symbols: (!config.symbols.is_empty())
            .then(|| config.symbols.iter().cloned().collect()),
        start: Some(config.start),
        end: Some(config.end),
    };
    let mut source = FileBackedPlaybackSource::new(args.snapshot_files.clone(), filter);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_for_handler = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("cancellation requested, will stop at next snapshot boundary");
        cancel_for_handler.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let driver = Driver::new(config, fee_schedules);
    let mut observer = NullObserver;
    let result = driver
        .run(&mut source, &mut observer, Some(&cancel))
        .context("backtest run failed")?;

    print_summary(&result);

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote full result");
    }

    Ok(())
}

/// Load a `BacktestConfig` from the required `--config` JSON file. There is
/// no built-in default: spread thresholds and position sizing are
/// risk parameters this CLI will not guess at silently.
fn load_config(args: &common::CliArgs) -> Result<BacktestConfig> {
    if let Some(path) = &args.config {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: BacktestConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        return Ok(config);
    }

    anyhow::bail!("no --config file supplied; xspread has no built-in default parameters")
}

fn load_fee_schedules(config: &BacktestConfig) -> Result<HashMap<String, FeeSchedule>> {
    let table = default_fee_table();
    for venue in &config.venues {
        if !table.contains_key(venue) {
            tracing::warn!(venue, "no fee schedule entry; falling back to default rates");
        }
    }
    Ok(table)
}
