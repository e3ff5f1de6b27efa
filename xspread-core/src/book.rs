//! Level-2 order book snapshot model.
//!
//! A snapshot is immutable once constructed; later arrivals for the same
//! `(venue, symbol)` replace it wholesale in the [`crate::store::BookStore`]
//! rather than mutating it in place.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the book an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The book side a taker consumes to execute this side of a trade:
    /// a buy lifts the asks, a sell hits the bids.
    pub fn consumed_book_side(self) -> BookSide {
        match self {
            Side::Buy => BookSide::Ask,
            Side::Sell => BookSide::Bid,
        }
    }
}

/// Which resting side of a book a quantity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// A single aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// A full L2 snapshot for one venue/symbol at one instant.
///
/// `bids` must be sorted descending by price, `asks` ascending; the
/// playback source is responsible for this invariant, the book model does
/// not re-sort on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub venue: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub sequence: u64,
}

impl BookSnapshot {
    pub fn new(
        venue: impl Into<String>,
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        sequence: u64,
    ) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
            timestamp,
            bids,
            asks,
            sequence,
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    /// `true` when the best bid is at or above the best ask, which cannot
    /// arise from a healthy venue but must not be allowed to crash the
    /// scanner or slippage calculator.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / Decimal::TWO)
    }

    /// Spread in basis points, `None` if either side is empty or the mid
    /// price is zero.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return None;
        }
        Some((ask - bid) / mid * Decimal::from(10_000))
    }

    /// Cumulative quantity available on `side` at prices at least as good
    /// as `bound` (i.e. bids with `price >= bound`, asks with `price <=
    /// bound`). Walks top-down and stops at the first violating level.
    pub fn depth_to_price(&self, side: BookSide, bound: Decimal) -> Decimal {
        let levels: &[PriceLevel] = match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        };
        let mut total = Decimal::ZERO;
        for level in levels {
            let within = match side {
                BookSide::Bid => level.price >= bound,
                BookSide::Ask => level.price <= bound,
            };
            if !within {
                break;
            }
            total += level.quantity;
        }
        total
    }

    /// Total quantity across the top `n` levels of `side`.
    pub fn total_depth(&self, side: BookSide, n: usize) -> Decimal {
        let levels: &[PriceLevel] = match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        };
        levels.iter().take(n).map(|l| l.quantity).sum()
    }
}
