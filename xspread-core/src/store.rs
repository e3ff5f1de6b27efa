//! In-memory latest-snapshot store.
//!
//! Holds exactly one snapshot per `(venue, symbol)`; arrivals replace, they
//! never merge with what came before.

use std::collections::HashMap;

use crate::book::BookSnapshot;

#[derive(Debug, Default)]
pub struct BookStore {
    latest: HashMap<(String, String), BookSnapshot>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: BookSnapshot) {
        let key = (snapshot.venue.clone(), snapshot.symbol.clone());
        self.latest.insert(key, snapshot);
    }

    pub fn get(&self, venue: &str, symbol: &str) -> Option<&BookSnapshot> {
        self.latest.get(&(venue.to_string(), symbol.to_string()))
    }

    /// All currently-known venue books for a symbol, keyed by venue.
    pub fn get_all_for_symbol(&self, symbol: &str) -> HashMap<&str, &BookSnapshot> {
        self.latest
            .iter()
            .filter(|((_, sym), _)| sym == symbol)
            .map(|((venue, _), snapshot)| (venue.as_str(), snapshot))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
