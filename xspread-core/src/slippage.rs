//! Depth-walking slippage model.
//!
//! Computes the realized volume-weighted execution price of a given size
//! against one side of a [`BookSnapshot`], and reports how much of the
//! requested size could actually be filled.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::book::{BookSide, BookSnapshot, PriceLevel, Side};

/// Per-venue maker/taker fee rates, expressed in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker_bps: Decimal,
    pub taker_bps: Decimal,
}

impl FeeSchedule {
    pub fn new(maker_bps: Decimal, taker_bps: Decimal) -> Self {
        Self {
            maker_bps,
            taker_bps,
        }
    }

    /// Fallback schedule applied to a venue with no entry in the fee table.
    pub fn fallback() -> Self {
        use rust_decimal_macros::dec;
        Self::new(dec!(10), dec!(10))
    }

    pub fn rate_for(&self, is_aggressive: bool) -> Decimal {
        if is_aggressive {
            self.taker_bps
        } else {
            self.maker_bps
        }
    }
}

/// A reasonable default per-venue fee table for the major spot venues a
/// cross-exchange spread strategy typically trades. Callers building a
/// `BacktestConfig` from real venue names can start from this and override
/// individual entries; venues absent from the map fall back to
/// [`FeeSchedule::fallback`].
pub fn default_fee_table() -> std::collections::HashMap<String, FeeSchedule> {
    use rust_decimal_macros::dec;
    let entries: &[(&str, Decimal, Decimal)] = &[
        ("binance", dec!(10), dec!(10)),
        ("bybit", dec!(10), dec!(10)),
        ("okx", dec!(8), dec!(10)),
        ("kucoin", dec!(10), dec!(10)),
        ("gate", dec!(20), dec!(20)),
        ("mexc", dec!(0), dec!(10)),
        ("bitget", dec!(10), dec!(10)),
        ("bingx", dec!(10), dec!(10)),
        ("coinex", dec!(20), dec!(20)),
        ("lbank", dec!(6), dec!(10)),
        ("htx", dec!(20), dec!(20)),
    ];
    entries
        .iter()
        .map(|(venue, maker, taker)| (venue.to_string(), FeeSchedule::new(*maker, *taker)))
        .collect()
}

/// One level consumed while walking the book for a given order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// The outcome of walking a book for a requested size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageResult {
    pub expected_price: Decimal,
    pub actual_price: Decimal,
    pub slippage_abs: Decimal,
    pub slippage_bps: Decimal,
    pub total_cost: Decimal,
    pub fee: Decimal,
    pub filled_quantity: Decimal,
    pub unfilled_quantity: Decimal,
    pub fills: Vec<FillLevel>,
    pub insufficient_liquidity: bool,
}

impl SlippageResult {
    fn degenerate(requested: Decimal) -> Self {
        Self {
            expected_price: Decimal::ZERO,
            actual_price: Decimal::ZERO,
            slippage_abs: Decimal::ZERO,
            slippage_bps: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            fee: Decimal::ZERO,
            filled_quantity: Decimal::ZERO,
            unfilled_quantity: requested,
            fills: Vec::new(),
            insufficient_liquidity: true,
        }
    }
}

/// Stateless walker; takes the book and fee schedule as inputs each call.
pub struct SlippageCalculator;

impl SlippageCalculator {
    /// Walk `side` of `book` for `size`, optionally including the fee for
    /// the requested aggressiveness in `total_cost`.
    pub fn calculate(
        book: &BookSnapshot,
        side: Side,
        size: Decimal,
        fees: FeeSchedule,
        include_fees: bool,
        is_aggressive: bool,
    ) -> SlippageResult {
        let book_side = side.consumed_book_side();
        let levels: &[PriceLevel] = match book_side {
            BookSide::Ask => &book.asks,
            BookSide::Bid => &book.bids,
        };

        let expected_price = levels.first().map(|l| l.price).unwrap_or(Decimal::ZERO);
        if expected_price.is_zero() {
            return SlippageResult::degenerate(size);
        }

        let mut remaining = size;
        let mut fills = Vec::new();
        let mut notional = Decimal::ZERO;
        let mut filled = Decimal::ZERO;

        for level in levels {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(level.quantity);
            if take.is_zero() {
                continue;
            }
            fills.push(FillLevel {
                price: level.price,
                quantity: take,
            });
            notional += level.price * take;
            filled += take;
            remaining -= take;
        }

        if filled.is_zero() {
            return SlippageResult::degenerate(size);
        }

        let actual_price = notional / filled;
        let slippage_abs = (actual_price - expected_price).abs();
        let slippage_bps = if expected_price.is_zero() {
            Decimal::ZERO
        } else {
            slippage_abs / expected_price * Decimal::from(10_000)
        };

        let fee_rate = fees.rate_for(is_aggressive);
        let fee = notional * fee_rate / Decimal::from(10_000);
        let total_cost = if include_fees { notional + fee } else { notional };

        SlippageResult {
            expected_price,
            actual_price,
            slippage_abs,
            slippage_bps,
            total_cost,
            fee,
            filled_quantity: filled,
            unfilled_quantity: remaining,
            fills,
            insufficient_liquidity: !remaining.is_zero(),
        }
    }
}
