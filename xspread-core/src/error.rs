//! Crate-level error taxonomy.
//!
//! Only configuration failures and playback-source resource failures are
//! surfaced as errors. Per-snapshot data problems (a malformed line, a
//! crossed book) are handled locally by the affected component and never
//! reach this type.

use thiserror::Error;

/// Errors a backtest run can terminate with.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// A `BacktestConfig` failed validation before any snapshot was processed.
    #[error("invalid backtest configuration: {0}")]
    Configuration(String),

    /// The playback source could not be connected to, read from, or closed.
    #[error("playback source error: {0}")]
    Source(#[from] SourceError),
}

/// Errors specific to acquiring or reading a [`crate::playback::PlaybackSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open snapshot stream {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read snapshot stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to decode snapshot on line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, BacktestError>;
