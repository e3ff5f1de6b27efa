//! Cross-venue spread opportunity scanner.
//!
//! For a symbol with books known on two or more venues, enumerates every
//! unordered venue pair in both directions and scores
//! `(short.best_bid - long.best_ask) / long.best_ask`, selecting the
//! maximizing pair/direction. Venues are iterated in sorted order so that
//! ties resolve to the same winner across runs.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::book::Side;
use crate::slippage::{FeeSchedule, SlippageCalculator, SlippageResult};
use crate::store::BookStore;

#[derive(Debug, Clone)]
pub struct SpreadOpportunity {
    pub symbol: String,
    pub long_venue: String,
    pub short_venue: String,
    pub spread_bps: Decimal,
    pub long_slippage: SlippageResult,
    pub short_slippage: SlippageResult,
    pub can_execute: bool,
}

pub struct SpreadScanner;

impl SpreadScanner {
    /// Find the best cross-venue spread opportunity for `symbol`, if any.
    pub fn scan(
        store: &BookStore,
        symbol: &str,
        size: Decimal,
        fee_schedules: &HashMap<String, FeeSchedule>,
    ) -> Option<SpreadOpportunity> {
        let books = store.get_all_for_symbol(symbol);
        if books.len() < 2 {
            return None;
        }

        let mut venues: Vec<&str> = books.keys().copied().collect();
        venues.sort_unstable();

        let mut best: Option<(Decimal, &str, &str)> = None;
        for i in 0..venues.len() {
            for j in (i + 1)..venues.len() {
                for (long_v, short_v) in [(venues[i], venues[j]), (venues[j], venues[i])] {
                    let long_book = books[long_v];
                    let short_book = books[short_v];
                    if long_book.is_crossed() || short_book.is_crossed() {
                        continue;
                    }
                    let Some(long_ask) = long_book.best_ask() else {
                        continue;
                    };
                    let Some(short_bid) = short_book.best_bid() else {
                        continue;
                    };
                    if long_ask.price.is_zero() {
                        continue;
                    }
                    let spread_bps =
                        (short_bid.price - long_ask.price) / long_ask.price * Decimal::from(10_000);
                    let is_new_best = match &best {
                        Some((current, _, _)) => spread_bps > *current,
                        None => true,
                    };
                    if is_new_best {
                        best = Some((spread_bps, long_v, short_v));
                    }
                }
            }
        }

        let (spread_bps, long_venue, short_venue) = best?;
        let long_book = books[long_venue];
        let short_book = books[short_venue];

        let long_fees = fee_schedules
            .get(long_venue)
            .copied()
            .unwrap_or_else(FeeSchedule::fallback);
        let short_fees = fee_schedules
            .get(short_venue)
            .copied()
            .unwrap_or_else(FeeSchedule::fallback);

        let long_slippage =
            SlippageCalculator::calculate(long_book, Side::Buy, size, long_fees, true, true);
        let short_slippage =
            SlippageCalculator::calculate(short_book, Side::Sell, size, short_fees, true, true);
        let can_execute =
            !long_slippage.insufficient_liquidity && !short_slippage.insufficient_liquidity;

        Some(SpreadOpportunity {
            symbol: symbol.to_string(),
            long_venue: long_venue.to_string(),
            short_venue: short_venue.to_string(),
            spread_bps,
            long_slippage,
            short_slippage,
            can_execute,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookSnapshot, PriceLevel};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fees() -> HashMap<String, FeeSchedule> {
        let mut map = HashMap::new();
        map.insert("binance".to_string(), FeeSchedule::new(dec!(1), dec!(4)));
        map.insert("bybit".to_string(), FeeSchedule::new(dec!(1), dec!(4)));
        map
    }

    #[test]
    fn no_opportunity_with_fewer_than_two_venues() {
        let mut store = BookStore::new();
        store.update(BookSnapshot::new(
            "binance",
            "BTC-USDT",
            Utc::now(),
            vec![PriceLevel::new(dec!(100), dec!(5))],
            vec![PriceLevel::new(dec!(101), dec!(5))],
            1,
        ));
        assert!(SpreadScanner::scan(&store, "BTC-USDT", dec!(1), &fees()).is_none());
    }

    #[test]
    fn picks_direction_with_largest_spread() {
        let mut store = BookStore::new();
        store.update(BookSnapshot::new(
            "binance",
            "BTC-USDT",
            Utc::now(),
            vec![PriceLevel::new(dec!(100), dec!(5))],
            vec![PriceLevel::new(dec!(101), dec!(5))],
            1,
        ));
        store.update(BookSnapshot::new(
            "bybit",
            "BTC-USDT",
            Utc::now(),
            vec![PriceLevel::new(dec!(105), dec!(5))],
            vec![PriceLevel::new(dec!(106), dec!(5))],
            1,
        ));
        let opp = SpreadScanner::scan(&store, "BTC-USDT", dec!(1), &fees()).unwrap();
        // long binance @101, short bybit @105: (105-101)/101 * 10000
        assert_eq!(opp.long_venue, "binance");
        assert_eq!(opp.short_venue, "bybit");
        assert!(opp.can_execute);
    }

    #[test]
    fn crossed_book_is_excluded_from_scoring() {
        let mut store = BookStore::new();
        store.update(BookSnapshot::new(
            "binance",
            "BTC-USDT",
            Utc::now(),
            vec![PriceLevel::new(dec!(102), dec!(5))],
            vec![PriceLevel::new(dec!(101), dec!(5))],
            1,
        ));
        store.update(BookSnapshot::new(
            "bybit",
            "BTC-USDT",
            Utc::now(),
            vec![PriceLevel::new(dec!(100), dec!(5))],
            vec![PriceLevel::new(dec!(103), dec!(5))],
            1,
        ));
        assert!(SpreadScanner::scan(&store, "BTC-USDT", dec!(1), &fees()).is_none());
    }
}
