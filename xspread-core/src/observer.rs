//! Read-only observer hooks into the driver loop.
//!
//! Modeled as a trait with no-op defaults, not a stored closure, so that
//! implementors can only borrow engine state, never mutate it, and so the
//! hook's lifetime is tied to the call rather than to a captured
//! environment.

use crate::book::BookSnapshot;
use crate::position::SpreadTrade;

pub trait BacktestObserver {
    /// Called once per processed snapshot, after the book store update and
    /// any entry/exit decisions for that snapshot are durable.
    fn on_snapshot(&mut self, _snapshot: &BookSnapshot) {}

    /// Called immediately after a new spread trade is opened.
    fn on_trade_open(&mut self, _trade: &SpreadTrade) {}

    /// Called immediately after a spread trade is closed.
    fn on_trade_close(&mut self, _trade: &SpreadTrade) {}
}

/// The default observer: does nothing. Used when the caller has no
/// interest in per-snapshot or per-trade callbacks.
#[derive(Debug, Default)]
pub struct NullObserver;

impl BacktestObserver for NullObserver {}
