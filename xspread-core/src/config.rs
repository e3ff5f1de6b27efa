//! Backtest configuration: the parameters the driver loop needs, validated
//! once up front so a malformed run fails before any snapshot is touched.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

/// Every parameter the core decision logic consumes, plus a small
/// passthrough bag for fields an external reporting layer cares about but
/// the core does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub venues: Vec<String>,
    pub symbols: Vec<String>,
    pub size_in_coins: Decimal,
    pub entry_spread_threshold_bps: Decimal,
    pub exit_spread_threshold_bps: Decimal,
    pub max_position_hold_secs: i64,
    pub max_concurrent_positions: usize,
    pub max_slippage_bps: Decimal,

    /// Forwarded verbatim into `BacktestResult` for an external reporting
    /// layer (e.g. order-slicing parameters); not interpreted by the core.
    #[serde(default)]
    pub passthrough: serde_json::Value,
}

impl BacktestConfig {
    pub fn max_position_hold_time(&self) -> Duration {
        Duration::seconds(self.max_position_hold_secs)
    }

    /// Fails fast on a structurally invalid configuration. Called once,
    /// before the driver touches the playback source.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.start >= self.end {
            return Err(BacktestError::Configuration(
                "start must precede end".to_string(),
            ));
        }
        if self.size_in_coins <= Decimal::ZERO {
            return Err(BacktestError::Configuration(
                "size_in_coins must be positive".to_string(),
            ));
        }
        if self.entry_spread_threshold_bps < Decimal::ZERO {
            return Err(BacktestError::Configuration(
                "entry_spread_threshold_bps must be non-negative".to_string(),
            ));
        }
        if self.exit_spread_threshold_bps < Decimal::ZERO {
            return Err(BacktestError::Configuration(
                "exit_spread_threshold_bps must be non-negative".to_string(),
            ));
        }
        if self.max_slippage_bps < Decimal::ZERO {
            return Err(BacktestError::Configuration(
                "max_slippage_bps must be non-negative".to_string(),
            ));
        }
        if self.max_concurrent_positions < 1 {
            return Err(BacktestError::Configuration(
                "max_concurrent_positions must be at least 1".to_string(),
            ));
        }
        if self.max_position_hold_secs <= 0 {
            return Err(BacktestError::Configuration(
                "max_position_hold_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid() -> BacktestConfig {
        BacktestConfig {
            start: "2024-01-01T00:00:00Z".parse().unwrap(),
            end: "2024-01-02T00:00:00Z".parse().unwrap(),
            venues: vec!["binance".to_string(), "bybit".to_string()],
            symbols: vec!["BTC-USDT".to_string()],
            size_in_coins: dec!(1),
            entry_spread_threshold_bps: dec!(10),
            exit_spread_threshold_bps: dec!(2),
            max_position_hold_secs: 3600,
            max_concurrent_positions: 2,
            max_slippage_bps: dec!(5),
            passthrough: serde_json::Value::Null,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_time_range() {
        let mut cfg = valid();
        cfg.end = cfg.start;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_size() {
        let mut cfg = valid();
        cfg.size_in_coins = Decimal::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_concurrent_positions() {
        let mut cfg = valid();
        cfg.max_concurrent_positions = 0;
        assert!(cfg.validate().is_err());
    }
}
