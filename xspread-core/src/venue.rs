//! Simulated venue: order/fill bookkeeping and depth-aware matching.
//!
//! A venue owns its own order book view, its open orders, and its fee
//! schedule. Matching walks the consumed side of the book level by level,
//! bounded by the limit price for limit orders; market orders consume
//! without a price bound until filled or the book is exhausted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::book::{BookSide, BookSnapshot, Side};
use crate::error::BacktestError;
use crate::slippage::FeeSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Limit { price: Decimal },
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: Uuid,
    pub order_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    pub is_maker: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub filled: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub fills: Vec<Fill>,
}

impl Order {
    pub fn remaining(&self) -> Decimal {
        self.quantity - self.filled
    }

    /// Volume-weighted average fill price, or zero if unfilled.
    pub fn avg_fill_price(&self) -> Decimal {
        if self.filled.is_zero() {
            return Decimal::ZERO;
        }
        let notional: Decimal = self.fills.iter().map(|f| f.price * f.quantity).sum();
        notional / self.filled
    }

    pub fn total_fee(&self) -> Decimal {
        self.fills.iter().map(|f| f.fee).sum()
    }
}

/// A single simulated venue: matching engine plus fee schedule.
pub struct SimulatedVenue {
    pub name: String,
    fee_schedule: FeeSchedule,
    orders: HashMap<Uuid, Order>,
    open_orders: HashMap<String, HashSet<Uuid>>,
    books: HashMap<String, BookSnapshot>,
}

impl SimulatedVenue {
    pub fn new(name: impl Into<String>, fee_schedule: FeeSchedule) -> Self {
        Self {
            name: name.into(),
            fee_schedule,
            orders: HashMap::new(),
            open_orders: HashMap::new(),
            books: HashMap::new(),
        }
    }

    pub fn current_book(&self, symbol: &str) -> Option<&BookSnapshot> {
        self.books.get(symbol)
    }

    pub fn get_order(&self, id: Uuid) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Place an order; if a book for the symbol is already known, attempt
    /// an immediate (taker) match before returning.
    pub fn place_order(
        &mut self,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Order, BacktestError> {
        if let OrderType::Limit { price } = order_type {
            if price <= Decimal::ZERO {
                return Err(BacktestError::Configuration(
                    "limit order price must be positive".to_string(),
                ));
            }
        }
        if quantity <= Decimal::ZERO {
            return Err(BacktestError::Configuration(
                "order quantity must be positive".to_string(),
            ));
        }

        let symbol = symbol.into();
        let mut order = Order {
            id: Uuid::new_v4(),
            symbol: symbol.clone(),
            side,
            order_type,
            quantity,
            filled: Decimal::ZERO,
            status: OrderStatus::Open,
            created_at: timestamp,
            fills: Vec::new(),
        };

        if let Some(book) = self.books.get(&symbol).cloned() {
            self.match_order(&mut order, &book, true);
        }

        if !order.status.is_terminal() {
            self.open_orders
                .entry(symbol)
                .or_default()
                .insert(order.id);
        }
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    /// Replace the current book for `symbol` and re-run matching for every
    /// resting order on that symbol. Fills produced here are maker fills.
    pub fn update_orderbook(&mut self, symbol: &str, book: BookSnapshot) {
        self.books.insert(symbol.to_string(), book.clone());

        let Some(open_ids) = self.open_orders.get(symbol).cloned() else {
            return;
        };
        let mut still_open = HashSet::new();
        for id in open_ids {
            if let Some(mut order) = self.orders.remove(&id) {
                self.match_order(&mut order, &book, false);
                if !order.status.is_terminal() {
                    still_open.insert(id);
                }
                self.orders.insert(id, order);
            }
        }
        self.open_orders.insert(symbol.to_string(), still_open);
    }

    /// Idempotent cancel: returns whether a transition actually occurred.
    pub fn cancel_order(&mut self, order_id: Uuid) -> bool {
        let Some(order) = self.orders.get_mut(&order_id) else {
            return false;
        };
        if order.status.is_terminal() {
            return false;
        }
        order.status = OrderStatus::Cancelled;
        if let Some(open) = self.open_orders.get_mut(&order.symbol) {
            open.remove(&order_id);
        }
        true
    }

    fn match_order(&mut self, order: &mut Order, book: &BookSnapshot, is_aggressive: bool) {
        let book_side = order.side.consumed_book_side();
        let levels: &[crate::book::PriceLevel] = match book_side {
            BookSide::Ask => &book.asks,
            BookSide::Bid => &book.bids,
        };

        let limit_price = match order.order_type {
            OrderType::Limit { price } => Some(price),
            OrderType::Market => None,
        };

        for level in levels {
            let mut remaining = order.remaining();
            if remaining.is_zero() {
                break;
            }
            if let Some(limit) = limit_price {
                let crosses = match order.side {
                    Side::Buy => level.price <= limit,
                    Side::Sell => level.price >= limit,
                };
                if !crosses {
                    break;
                }
            }
            let take = remaining.min(level.quantity);
            if take.is_zero() {
                continue;
            }
            let fee_rate = self.fee_schedule.rate_for(is_aggressive);
            let fee = level.price * take * fee_rate / Decimal::from(10_000);
            order.fills.push(Fill {
                id: Uuid::new_v4(),
                order_id: order.id,
                timestamp: book.timestamp,
                price: level.price,
                quantity: take,
                fee,
                is_maker: !is_aggressive,
            });
            order.filled += take;
            remaining -= take;
            debug!(order_id = %order.id, price = %level.price, quantity = %take, "order fill");
        }

        order.status = if order.remaining().is_zero() {
            OrderStatus::Filled
        } else if !order.filled.is_zero() {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        };
    }
}
