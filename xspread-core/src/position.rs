//! Position lifecycle: entry gating, open-position tracking, exit
//! detection, and PnL settlement for market-neutral spread trades.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::book::Side;
use crate::config::BacktestConfig;
use crate::scanner::SpreadOpportunity;
use crate::slippage::{FeeSchedule, SlippageCalculator};
use crate::store::BookStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    SpreadConverged,
    MaxHoldTime,
}

/// A market-neutral long/short position on one canonical symbol across two
/// venues, and the unit of P&L for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadTrade {
    pub id: Uuid,
    pub symbol: String,
    pub long_venue: String,
    pub short_venue: String,
    pub entry_time: DateTime<Utc>,
    pub size: Decimal,
    pub long_entry_px: Decimal,
    pub short_entry_px: Decimal,
    pub entry_spread_bps: Decimal,

    pub exit_time: Option<DateTime<Utc>>,
    pub long_exit_px: Option<Decimal>,
    pub short_exit_px: Option<Decimal>,
    pub exit_spread_bps: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,

    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    pub is_open: bool,
}

/// Tracks open and closed spread trades across the run. At most one open
/// trade per symbol; at most `max_concurrent_positions` open globally.
#[derive(Debug, Default)]
pub struct PositionEngine {
    open: HashMap<String, SpreadTrade>,
    closed: Vec<SpreadTrade>,
}

impl PositionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &SpreadTrade> {
        self.open.values()
    }

    pub fn get_open(&self, symbol: &str) -> Option<&SpreadTrade> {
        self.open.get(symbol)
    }

    pub fn closed_trades(&self) -> &[SpreadTrade] {
        &self.closed
    }

    /// Consumes the engine, returning every trade: closed ones first, then
    /// any still open at the end of the run.
    pub fn into_all_trades(self) -> Vec<SpreadTrade> {
        let mut trades = self.closed;
        trades.extend(self.open.into_values());
        trades
    }

    /// Attempt to enter `opportunity`. Returns `true` if a trade was
    /// opened. Gating order follows §4.G: concurrency cap, entry
    /// threshold, combined slippage cap, liquidity, then the one-open-
    /// trade-per-symbol rule.
    pub fn try_enter(
        &mut self,
        opportunity: &SpreadOpportunity,
        config: &BacktestConfig,
        timestamp: DateTime<Utc>,
    ) -> bool {
        if self.open.len() >= config.max_concurrent_positions {
            return false;
        }
        if opportunity.spread_bps < config.entry_spread_threshold_bps {
            return false;
        }
        let combined_slippage =
            opportunity.long_slippage.slippage_bps + opportunity.short_slippage.slippage_bps;
        if combined_slippage > config.max_slippage_bps {
            return false;
        }
        if !opportunity.can_execute {
            return false;
        }
        if self.open.contains_key(&opportunity.symbol) {
            return false;
        }

        let entry_fees = leg_fee(
            opportunity.long_slippage.total_cost,
            opportunity.long_slippage.actual_price,
            opportunity.long_slippage.filled_quantity,
        ) + leg_fee(
            opportunity.short_slippage.total_cost,
            opportunity.short_slippage.actual_price,
            opportunity.short_slippage.filled_quantity,
        );

        let size = opportunity
            .long_slippage
            .filled_quantity
            .min(opportunity.short_slippage.filled_quantity);

        let trade = SpreadTrade {
            id: Uuid::new_v4(),
            symbol: opportunity.symbol.clone(),
            long_venue: opportunity.long_venue.clone(),
            short_venue: opportunity.short_venue.clone(),
            entry_time: timestamp,
            size,
            long_entry_px: opportunity.long_slippage.actual_price,
            short_entry_px: opportunity.short_slippage.actual_price,
            entry_spread_bps: opportunity.spread_bps,
            exit_time: None,
            long_exit_px: None,
            short_exit_px: None,
            exit_spread_bps: None,
            exit_reason: None,
            gross_pnl: Decimal::ZERO,
            fees: entry_fees,
            net_pnl: Decimal::ZERO,
            is_open: true,
        };

        info!(
            symbol = %trade.symbol,
            long_venue = %trade.long_venue,
            short_venue = %trade.short_venue,
            entry_spread_bps = %trade.entry_spread_bps,
            "spread trade opened"
        );
        self.open.insert(trade.symbol.clone(), trade);
        true
    }

    /// Check whether the open trade on `symbol`, if any, should close on
    /// this snapshot. Returns the closed trade, if one was closed.
    pub fn check_exit(
        &mut self,
        symbol: &str,
        store: &BookStore,
        fee_schedules: &HashMap<String, FeeSchedule>,
        config: &BacktestConfig,
        timestamp: DateTime<Utc>,
    ) -> Option<SpreadTrade> {
        let trade = self.open.get(symbol)?;

        let long_book = store.get(&trade.long_venue, symbol)?;
        let short_book = store.get(&trade.short_venue, symbol)?;
        let long_bid = long_book.best_bid()?;
        let short_ask = short_book.best_ask()?;
        if short_ask.price.is_zero() {
            return None;
        }

        let closing_spread_bps =
            (long_bid.price - short_ask.price) / short_ask.price * Decimal::from(10_000);

        let timed_out = timestamp - trade.entry_time > config.max_position_hold_time();
        let converged = closing_spread_bps >= -config.exit_spread_threshold_bps;

        if !timed_out && !converged {
            return None;
        }

        let long_fees = fee_schedules
            .get(&trade.long_venue)
            .copied()
            .unwrap_or_else(FeeSchedule::fallback);
        let short_fees = fee_schedules
            .get(&trade.short_venue)
            .copied()
            .unwrap_or_else(FeeSchedule::fallback);

        let long_slip =
            SlippageCalculator::calculate(long_book, Side::Sell, trade.size, long_fees, true, true);
        let short_slip =
            SlippageCalculator::calculate(short_book, Side::Buy, trade.size, short_fees, true, true);

        let mut trade = self.open.remove(symbol).expect("checked present above");
        let long_exit = long_slip.actual_price;
        let short_exit = short_slip.actual_price;

        let gross_pnl = (long_exit - trade.long_entry_px) * trade.size
            + (trade.short_entry_px - short_exit) * trade.size;
        let exit_fees = leg_fee(long_slip.total_cost, long_slip.actual_price, long_slip.filled_quantity)
            + leg_fee(
                short_slip.total_cost,
                short_slip.actual_price,
                short_slip.filled_quantity,
            );

        trade.exit_time = Some(timestamp);
        trade.long_exit_px = Some(long_exit);
        trade.short_exit_px = Some(short_exit);
        trade.exit_spread_bps = Some(closing_spread_bps);
        trade.exit_reason = Some(if converged {
            ExitReason::SpreadConverged
        } else {
            ExitReason::MaxHoldTime
        });
        trade.gross_pnl = gross_pnl;
        trade.fees += exit_fees;
        trade.net_pnl = gross_pnl - trade.fees;
        trade.is_open = false;

        info!(
            symbol = %trade.symbol,
            net_pnl = %trade.net_pnl,
            reason = ?trade.exit_reason,
            "spread trade closed"
        );

        self.closed.push(trade.clone());
        Some(trade)
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.closed.iter().map(|t| t.net_pnl).sum()
    }

    /// Mark-to-market every open trade against the latest books; trades
    /// whose books are not both known yet are skipped.
    pub fn unrealized_pnl(&self, store: &BookStore) -> Decimal {
        let mut total = Decimal::ZERO;
        for trade in self.open.values() {
            let Some(long_book) = store.get(&trade.long_venue, &trade.symbol) else {
                continue;
            };
            let Some(short_book) = store.get(&trade.short_venue, &trade.symbol) else {
                continue;
            };
            let Some(long_bid) = long_book.best_bid() else {
                continue;
            };
            let Some(short_ask) = short_book.best_ask() else {
                continue;
            };
            total += (long_bid.price - trade.long_entry_px) * trade.size
                + (trade.short_entry_px - short_ask.price) * trade.size;
        }
        total
    }

    pub fn open_symbols(&self) -> HashSet<&str> {
        self.open.keys().map(|s| s.as_str()).collect()
    }
}

fn leg_fee(total_cost: Decimal, actual_price: Decimal, filled_quantity: Decimal) -> Decimal {
    total_cost - actual_price * filled_quantity
}
