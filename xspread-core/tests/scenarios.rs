//! End-to-end scenario tests driving the engine entirely through its public
//! API: a file-backed playback source feeding the `Driver`.

use std::collections::HashMap;
use std::io::Write;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;
use xspread_core::{BacktestConfig, Driver, ExitReason, NullObserver};

fn base_config() -> BacktestConfig {
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
        max_slippage_bps: dec!(50),
        passthrough: serde_json::Value::Null,
    }
}

/// Zero trading fees on both venues so trade-level arithmetic is exact and
/// easy to check by hand.
fn zero_fee_schedules() -> HashMap<String, xspread_core::FeeSchedule> {
    let mut map = HashMap::new();
    map.insert(
        "binance".to_string(),
        xspread_core::FeeSchedule::new(Decimal::ZERO, Decimal::ZERO),
    );
    map.insert(
        "bybit".to_string(),
        xspread_core::FeeSchedule::new(Decimal::ZERO, Decimal::ZERO),
    );
    map
}

fn snapshot_line(venue: &str, symbol: &str, bid: &str, ask: &str, qty: &str, ts: &str) -> String {
    format!(
        r#"{{"venue":"{venue}","symbol":"{symbol}","timestamp":"{ts}","bids":[{{"price":"{bid}","quantity":"{qty}"}}],"asks":[{{"price":"{ask}","quantity":"{qty}"}}],"sequence":1}}"#
    )
}

fn write_stream(dir: &std::path::Path, name: &str, lines: &[String]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

/// S1 — identical books on both venues never clear the entry threshold.
#[test]
fn s1_no_opportunity_produces_zero_trades() {
    let tmp = TempDir::new().unwrap();
    let a = write_stream(
        tmp.path(),
        "binance.jsonl",
        &[snapshot_line(
            "binance",
            "BTC-USDT",
            "100",
            "101",
            "10",
            "2024-01-01T00:00:00Z",
        )],
    );
    let b = write_stream(
        tmp.path(),
        "bybit.jsonl",
        &[snapshot_line(
            "bybit",
            "BTC-USDT",
            "100",
            "101",
            "10",
            "2024-01-01T00:00:00Z",
        )],
    );

    let mut source = xspread_core::FileBackedPlaybackSource::new(
        vec![a, b],
        xspread_core::PlaybackFilter::default(),
    );
    let driver = Driver::new(base_config(), zero_fee_schedules());
    let mut observer = NullObserver;
    let result = driver.run(&mut source, &mut observer, None).unwrap();

    assert_eq!(result.statistics.total_trades, 0);
    assert_eq!(result.statistics.total_fees, Decimal::ZERO);
    assert_eq!(result.statistics.net_pnl, Decimal::ZERO);
}

/// S2 — a clean dislocation opens, then converges a minute later and closes
/// with an exact, hand-computed PnL.
#[test]
fn s2_single_clean_trade_round_trips() {
    let tmp = TempDir::new().unwrap();
    let a = write_stream(
        tmp.path(),
        "binance.jsonl",
        &[
            snapshot_line("binance", "BTC-USDT", "99", "100", "5", "2024-01-01T00:00:00Z"),
            snapshot_line("binance", "BTC-USDT", "101", "102", "5", "2024-01-01T00:01:00Z"),
        ],
    );
    let b = write_stream(
        tmp.path(),
        "bybit.jsonl",
        &[
            snapshot_line("bybit", "BTC-USDT", "102", "103", "5", "2024-01-01T00:00:00Z"),
            snapshot_line("bybit", "BTC-USDT", "101", "101", "5", "2024-01-01T00:01:00Z"),
        ],
    );

    let mut source = xspread_core::FileBackedPlaybackSource::new(
        vec![a, b],
        xspread_core::PlaybackFilter::default(),
    );
    let driver = Driver::new(base_config(), zero_fee_schedules());
    let mut observer = NullObserver;
    let result = driver.run(&mut source, &mut observer, None).unwrap();

    assert_eq!(result.statistics.total_trades, 1);
    let trade = &result.trades[0];
    assert_eq!(trade.long_venue, "binance");
    assert_eq!(trade.short_venue, "bybit");
    assert_eq!(trade.long_entry_px, dec!(100));
    assert_eq!(trade.short_entry_px, dec!(102));
    assert_eq!(trade.entry_spread_bps, dec!(200));
    assert_eq!(trade.long_exit_px, Some(dec!(101)));
    assert_eq!(trade.short_exit_px, Some(dec!(101)));
    assert_eq!(trade.gross_pnl, dec!(2));
    assert_eq!(trade.net_pnl, dec!(2));
    assert_eq!(trade.exit_reason, Some(ExitReason::SpreadConverged));
}

/// S3 — the same dislocation as S2 but a size the book cannot support;
/// entry gating must reject it for insufficient liquidity.
#[test]
fn s3_oversized_order_is_rejected_for_insufficient_liquidity() {
    let tmp = TempDir::new().unwrap();
    let a = write_stream(
        tmp.path(),
        "binance.jsonl",
        &[snapshot_line(
            "binance",
            "BTC-USDT",
            "99",
            "100",
            "5",
            "2024-01-01T00:00:00Z",
        )],
    );
    let b = write_stream(
        tmp.path(),
        "bybit.jsonl",
        &[snapshot_line(
            "bybit",
            "BTC-USDT",
            "102",
            "103",
            "5",
            "2024-01-01T00:00:00Z",
        )],
    );

    let mut config = base_config();
    config.size_in_coins = dec!(20);
    let mut source = xspread_core::FileBackedPlaybackSource::new(
        vec![a, b],
        xspread_core::PlaybackFilter::default(),
    );
    let driver = Driver::new(config, zero_fee_schedules());
    let mut observer = NullObserver;
    let result = driver.run(&mut source, &mut observer, None).unwrap();

    assert_eq!(result.statistics.total_trades, 0);
}

/// S4 — the spread never converges; the position must still close once the
/// hold-time cap expires.
#[test]
fn s4_hold_time_exit_fires_without_convergence() {
    let tmp = TempDir::new().unwrap();
    let a = write_stream(
        tmp.path(),
        "binance.jsonl",
        &[
            snapshot_line("binance", "BTC-USDT", "99", "100", "5", "2024-01-01T00:00:00Z"),
            snapshot_line("binance", "BTC-USDT", "99", "100", "5", "2024-01-01T02:00:00Z"),
        ],
    );
    let b = write_stream(
        tmp.path(),
        "bybit.jsonl",
        &[
            snapshot_line("bybit", "BTC-USDT", "102", "103", "5", "2024-01-01T00:00:00Z"),
            snapshot_line("bybit", "BTC-USDT", "102", "103", "5", "2024-01-01T02:00:00Z"),
        ],
    );

    let mut config = base_config();
    config.max_position_hold_secs = 3600;
    let mut source = xspread_core::FileBackedPlaybackSource::new(
        vec![a, b],
        xspread_core::PlaybackFilter::default(),
    );
    let driver = Driver::new(config, zero_fee_schedules());
    let mut observer = NullObserver;
    let result = driver.run(&mut source, &mut observer, None).unwrap();

    assert_eq!(result.statistics.total_trades, 1);
    assert_eq!(
        result.trades[0].exit_reason,
        Some(ExitReason::MaxHoldTime)
    );
}

/// S5 — three simultaneous opportunities on distinct symbols, cap of two:
/// exactly two are entered and the third is not retried once two others
/// already hold the cap.
#[test]
fn s5_concurrent_position_cap_limits_entries() {
    let tmp = TempDir::new().unwrap();
    let symbols = ["AAA-USDT", "BBB-USDT", "CCC-USDT"];
    let mut a_lines = Vec::new();
    let mut b_lines = Vec::new();
    for symbol in symbols {
        a_lines.push(snapshot_line(
            "binance",
            symbol,
            "99",
            "100",
            "5",
            "2024-01-01T00:00:00Z",
        ));
        b_lines.push(snapshot_line(
            "bybit",
            symbol,
            "102",
            "103",
            "5",
            "2024-01-01T00:00:00Z",
        ));
    }
    let a = write_stream(tmp.path(), "binance.jsonl", &a_lines);
    let b = write_stream(tmp.path(), "bybit.jsonl", &b_lines);

    let mut config = base_config();
    config.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.max_concurrent_positions = 2;
    let mut source = xspread_core::FileBackedPlaybackSource::new(
        vec![a, b],
        xspread_core::PlaybackFilter::default(),
    );
    let driver = Driver::new(config, zero_fee_schedules());
    let mut observer = NullObserver;
    let result = driver.run(&mut source, &mut observer, None).unwrap();

    let open_trades: Vec<_> = result.trades.iter().filter(|t| t.is_open).collect();
    assert_eq!(open_trades.len(), 2);
    assert_eq!(result.statistics.total_trades, 0);
}

/// S6 — statistics formulas against a hand-picked set of closed trades and
/// an equity curve with a known drawdown.
#[test]
fn s6_statistics_match_hand_computed_values() {
    use chrono::Utc;
    use xspread_core::{EquityCurve, Statistics};

    let trades = vec![
        closed_trade(dec!(10)),
        closed_trade(dec!(5)),
        closed_trade(dec!(-3)),
    ];

    let mut curve = EquityCurve::new();
    let t = Utc::now();
    curve.record(t, dec!(10), Decimal::ZERO);
    curve.record(t, dec!(15), Decimal::ZERO);
    curve.record(t, dec!(12), Decimal::ZERO);

    let stats = Statistics::compute(&trades, &curve, 1.0);
    assert_eq!(stats.win_rate_pct, dec!(200) / dec!(3));
    assert_eq!(stats.profit_factor, Some(dec!(5)));
    assert_eq!(stats.max_drawdown, dec!(3));
}

fn closed_trade(net_pnl: Decimal) -> xspread_core::SpreadTrade {
    use chrono::Utc;
    use uuid::Uuid;
    use xspread_core::SpreadTrade;

    SpreadTrade {
        id: Uuid::new_v4(),
        symbol: "BTC-USDT".to_string(),
        long_venue: "binance".to_string(),
        short_venue: "bybit".to_string(),
        entry_time: Utc::now(),
        size: dec!(1),
        long_entry_px: dec!(100),
        short_entry_px: dec!(102),
        entry_spread_bps: dec!(200),
        exit_time: Some(Utc::now()),
        long_exit_px: Some(dec!(101)),
        short_exit_px: Some(dec!(101)),
        exit_spread_bps: Some(dec!(0)),
        exit_reason: Some(ExitReason::SpreadConverged),
        gross_pnl: net_pnl,
        fees: Decimal::ZERO,
        net_pnl,
        is_open: false,
    }
}
