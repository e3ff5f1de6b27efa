//! Sequential driver loop binding playback, the scanner, and the position
//! engine into a single deterministic backtest run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BacktestConfig;
use crate::error::BacktestError;
use crate::observer::BacktestObserver;
use crate::playback::PlaybackSource;
use crate::position::{PositionEngine, SpreadTrade};
use crate::scanner::SpreadScanner;
use crate::slippage::FeeSchedule;
use crate::stats::{EquityCurve, Statistics};
use crate::store::BookStore;
use crate::venue::SimulatedVenue;

/// Everything produced by a run: serializable so an external reporting
/// layer (or this crate's own CLI) can render it without this crate
/// depending on any particular output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub run_start: DateTime<Utc>,
    pub run_end: DateTime<Utc>,
    pub trades: Vec<SpreadTrade>,
    pub statistics: Statistics,
    pub snapshots_processed: u64,
    pub avg_opportunity_spread_bps: Option<Decimal>,
    pub avg_entry_slippage_bps: Option<Decimal>,
}

/// Binds a validated configuration and a per-venue fee table to a
/// single-threaded, deterministic run over a [`PlaybackSource`].
pub struct Driver {
    config: BacktestConfig,
    fee_schedules: HashMap<String, FeeSchedule>,
}

impl Driver {
    pub fn new(config: BacktestConfig, fee_schedules: HashMap<String, FeeSchedule>) -> Self {
        Self {
            config,
            fee_schedules,
        }
    }

    /// Run to completion (or until `cancel` is observed at a snapshot
    /// boundary). `source.close()` is called on every exit path, including
    /// an early return from configuration validation.
    pub fn run(
        &self,
        source: &mut dyn PlaybackSource,
        observer: &mut dyn BacktestObserver,
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;
        source.connect()?;

        let run_result = self.drive(source, observer, cancel);
        source.close()?;
        run_result
    }

    fn drive(
        &self,
        source: &mut dyn PlaybackSource,
        observer: &mut dyn BacktestObserver,
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestResult, BacktestError> {
        let mut store = BookStore::new();
        let mut positions = PositionEngine::new();
        let mut equity_curve = EquityCurve::new();

        // One simulated venue per configured venue, mirroring the source's
        // `self.exchanges` map: fed every snapshot for bookkeeping, even
        // though entries/exits are priced directly off the slippage walk
        // rather than through `place_order`.
        let mut venues: HashMap<String, SimulatedVenue> = self
            .config
            .venues
            .iter()
            .map(|name| {
                let fees = self
                    .fee_schedules
                    .get(name)
                    .copied()
                    .unwrap_or_else(FeeSchedule::fallback);
                (name.clone(), SimulatedVenue::new(name.clone(), fees))
            })
            .collect();

        let mut snapshots_processed: u64 = 0;
        let mut opportunity_spread_sum = Decimal::ZERO;
        let mut opportunity_spread_count: u64 = 0;
        let mut entry_slippage_sum = Decimal::ZERO;
        let mut entry_count: u64 = 0;

        let mut first_ts: Option<DateTime<Utc>> = None;
        let mut last_ts: Option<DateTime<Utc>> = None;

        loop {
            if let Some(flag) = cancel {
                if flag.load(Ordering::SeqCst) {
                    info!("backtest cancelled at snapshot boundary");
                    break;
                }
            }

            let Some(snapshot) = source.next_snapshot()? else {
                break;
            };

            first_ts.get_or_insert(snapshot.timestamp);
            last_ts = Some(snapshot.timestamp);

            store.update(snapshot.clone());

            if let Some(venue) = venues.get_mut(&snapshot.venue) {
                venue.update_orderbook(&snapshot.symbol, snapshot.clone());
            }

            if let Some(closed) = positions.check_exit(
                &snapshot.symbol,
                &store,
                &self.fee_schedules,
                &self.config,
                snapshot.timestamp,
            ) {
                observer.on_trade_close(&closed);
            }

            if let Some(opportunity) = SpreadScanner::scan(
                &store,
                &snapshot.symbol,
                self.config.size_in_coins,
                &self.fee_schedules,
            ) {
                opportunity_spread_sum += opportunity.spread_bps;
                opportunity_spread_count += 1;

                let combined_slippage =
                    opportunity.long_slippage.slippage_bps + opportunity.short_slippage.slippage_bps;
                let entered =
                    positions.try_enter(&opportunity, &self.config, snapshot.timestamp);
                if entered {
                    entry_slippage_sum += combined_slippage;
                    entry_count += 1;
                    if let Some(trade) = positions.get_open(&opportunity.symbol) {
                        observer.on_trade_open(trade);
                    }
                }
            }

            let realized = positions.realized_pnl();
            let unrealized = positions.unrealized_pnl(&store);
            equity_curve.record(snapshot.timestamp, realized, unrealized);

            observer.on_snapshot(&snapshot);
            snapshots_processed += 1;
        }

        let run_start = first_ts.unwrap_or(self.config.start);
        let run_end = last_ts.unwrap_or(self.config.end);
        // Raw elapsed days over the run window; `Statistics::compute` applies
        // the spec's `max(1, days_in_range)` floor itself.
        let days_in_range = (run_end - run_start).num_seconds() as f64 / 86_400.0;

        let trades = positions.into_all_trades();
        let statistics = Statistics::compute(&trades, &equity_curve, days_in_range);

        let avg_opportunity_spread_bps = (opportunity_spread_count > 0)
            .then(|| opportunity_spread_sum / Decimal::from(opportunity_spread_count));
        let avg_entry_slippage_bps =
            (entry_count > 0).then(|| entry_slippage_sum / Decimal::from(entry_count));

        info!(
            snapshots_processed,
            trades = trades.len(),
            net_pnl = %statistics.net_pnl,
            "backtest run finished"
        );

        Ok(BacktestResult {
            config: self.config.clone(),
            run_start,
            run_end,
            trades,
            statistics,
            snapshots_processed,
            avg_opportunity_spread_bps,
            avg_entry_slippage_bps,
        })
    }
}
