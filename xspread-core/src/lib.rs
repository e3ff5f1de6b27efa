//! xspread-core — deterministic historical backtest engine for
//! cross-exchange spread (basis) trading.
//!
//! Given a chronological stream of L2 order-book snapshots across venues,
//! this crate detects cross-venue dislocations, simulates entering and
//! exiting market-neutral spread positions subject to depth and slippage
//! constraints, and reports per-trade accounting plus aggregate risk
//! statistics.
//!
//! ## Core modules
//! - `book`: L2 snapshot model and its derived fields
//! - `slippage`: depth-walking VWAP/fee calculator
//! - `store`: latest-snapshot-per-venue map
//! - `playback`: chronological snapshot source, with a file-backed impl
//! - `venue`: simulated order matching and maker/taker fee accounting
//! - `scanner`: cross-venue spread opportunity detection
//! - `position`: entry/exit gating and PnL settlement
//! - `stats`: equity curve and Sharpe/Sortino/drawdown statistics
//! - `driver`: the sequential loop binding the above together
//! - `observer`: read-only callback hooks into the driver loop
//! - `config`: backtest parameters and validation
//! - `error`: the crate's error taxonomy

pub mod book;
pub mod config;
pub mod driver;
pub mod error;
pub mod observer;
pub mod playback;
pub mod position;
pub mod scanner;
pub mod slippage;
pub mod stats;
pub mod store;
pub mod venue;
pub mod utils;

pub use book::{BookSide, BookSnapshot, PriceLevel, Side};
pub use config::BacktestConfig;
pub use driver::{BacktestResult, Driver};
pub use error::{BacktestError, SourceError};
pub use observer::{BacktestObserver, NullObserver};
pub use playback::{FileBackedPlaybackSource, PlaybackFilter, PlaybackSource};
pub use position::{ExitReason, PositionEngine, SpreadTrade};
pub use scanner::{SpreadOpportunity, SpreadScanner};
pub use slippage::{default_fee_table, FeeSchedule, SlippageCalculator, SlippageResult};
pub use stats::{EquityCurve, EquitySample, Statistics};
pub use store::BookStore;

/// Convenience re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        BacktestConfig, BacktestError, BacktestObserver, BacktestResult, BookSide, BookSnapshot,
        BookStore, Driver, EquityCurve, ExitReason, FeeSchedule, FileBackedPlaybackSource,
        NullObserver, PlaybackFilter, PlaybackSource, PositionEngine, PriceLevel, Side,
        SlippageCalculator, SpreadOpportunity, SpreadScanner, SpreadTrade, Statistics,
    };
}
