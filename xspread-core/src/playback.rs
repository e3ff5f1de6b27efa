//! Chronological snapshot playback.
//!
//! [`PlaybackSource`] is the single-pass, pull-style contract the driver
//! consumes: snapshots come back in non-decreasing timestamp order,
//! filtered by venue/symbol/time range, until the source is exhausted.
//!
//! [`FileBackedPlaybackSource`] is the concrete, local/offline
//! implementation: one newline-delimited-JSON file per stream, lazily
//! parsed and k-way merged via a min-heap keyed on `(timestamp, stream
//! index)` so same-timestamp ties resolve in stream-input order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::book::BookSnapshot;
use crate::error::SourceError;

/// A single-pass chronological feed of book snapshots.
pub trait PlaybackSource {
    /// Acquire whatever resources the source needs (open files, connect a
    /// database, etc). Idempotent.
    fn connect(&mut self) -> Result<(), SourceError>;

    /// Release resources. Idempotent; must be safe to call even if
    /// `connect` was never called or already failed.
    fn close(&mut self) -> Result<(), SourceError>;

    /// Total number of snapshots the source will yield, for progress
    /// reporting. Does not consume the iteration.
    fn count(&self) -> Result<u64, SourceError>;

    /// Pull the next snapshot in non-decreasing timestamp order, or `None`
    /// once the source is exhausted.
    fn next_snapshot(&mut self) -> Result<Option<BookSnapshot>, SourceError>;
}

struct HeapEntry {
    timestamp: DateTime<Utc>,
    stream_idx: usize,
    snapshot: BookSnapshot,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.stream_idx == other.stream_idx
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Reversed so BinaryHeap (a max-heap) behaves as a min-heap on
    // (timestamp, stream_idx).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.stream_idx.cmp(&self.stream_idx))
    }
}

/// Optional filters applied as the merge yields snapshots, before they
/// reach the book store.
#[derive(Debug, Clone, Default)]
pub struct PlaybackFilter {
    pub venues: Option<HashSet<String>>,
    pub symbols: Option<HashSet<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl PlaybackFilter {
    fn admits(&self, snapshot: &BookSnapshot) -> bool {
        if let Some(venues) = &self.venues {
            if !venues.contains(&snapshot.venue) {
                return false;
            }
        }
        if let Some(symbols) = &self.symbols {
            if !symbols.contains(&snapshot.symbol) {
                return false;
            }
        }
        if let Some(start) = self.start {
            if snapshot.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if snapshot.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Reads one snapshot-per-line JSON file per stream and merges them into
/// global chronological order.
pub struct FileBackedPlaybackSource {
    paths: Vec<PathBuf>,
    filter: PlaybackFilter,
    readers: Vec<Option<BufReader<File>>>,
    line_nos: Vec<u64>,
    heap: BinaryHeap<HeapEntry>,
    connected: bool,
}

impl FileBackedPlaybackSource {
    pub fn new(paths: Vec<PathBuf>, filter: PlaybackFilter) -> Self {
        let n = paths.len();
        Self {
            paths,
            filter,
            readers: (0..n).map(|_| None).collect(),
            line_nos: vec![0; n],
            heap: BinaryHeap::new(),
            connected: false,
        }
    }

    /// Read and parse lines from stream `idx` until one decodes
    /// successfully or the stream is exhausted, then push it onto the
    /// merge heap. Malformed lines are logged and skipped, per the
    /// source-error handling policy.
    fn refill(&mut self, idx: usize) -> Result<(), SourceError> {
        loop {
            let Some(reader) = self.readers[idx].as_mut() else {
                return Ok(());
            };
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                self.readers[idx] = None;
                return Ok(());
            }
            self.line_nos[idx] += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<BookSnapshot>(trimmed) {
                Ok(snapshot) => {
                    self.heap.push(HeapEntry {
                        timestamp: snapshot.timestamp,
                        stream_idx: idx,
                        snapshot,
                    });
                    return Ok(());
                }
                Err(source) => {
                    warn!(
                        path = %self.paths[idx].display(),
                        line = self.line_nos[idx],
                        error = %source,
                        "skipping malformed snapshot line"
                    );
                    continue;
                }
            }
        }
    }
}

impl PlaybackSource for FileBackedPlaybackSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        for (idx, path) in self.paths.iter().enumerate() {
            let file = File::open(path).map_err(|source| SourceError::Open {
                path: path.display().to_string(),
                source,
            })?;
            self.readers[idx] = Some(BufReader::new(file));
        }
        self.connected = true;
        for idx in 0..self.paths.len() {
            self.refill(idx)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        for reader in self.readers.iter_mut() {
            *reader = None;
        }
        self.heap.clear();
        self.connected = false;
        Ok(())
    }

    fn count(&self) -> Result<u64, SourceError> {
        let mut total = 0u64;
        for path in &self.paths {
            let file = File::open(path).map_err(|source| SourceError::Open {
                path: path.display().to_string(),
                source,
            })?;
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    total += 1;
                }
            }
        }
        Ok(total)
    }

    fn next_snapshot(&mut self) -> Result<Option<BookSnapshot>, SourceError> {
        loop {
            let Some(entry) = self.heap.pop() else {
                return Ok(None);
            };
            self.refill(entry.stream_idx)?;
            if self.filter.admits(&entry.snapshot) {
                return Ok(Some(entry.snapshot));
            }
        }
    }
}

impl Drop for FileBackedPlaybackSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::TempDir;

    fn write_lines(dir: &std::path::Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    fn snapshot_line(venue: &str, symbol: &str, ts: &str, seq: u64) -> String {
        format!(
            r#"{{"venue":"{venue}","symbol":"{symbol}","timestamp":"{ts}","bids":[{{"price":"100","quantity":"1"}}],"asks":[{{"price":"101","quantity":"1"}}],"sequence":{seq}}}"#
        )
    }

    #[test]
    fn merges_two_streams_in_timestamp_order() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let a = write_lines(
            dir,
            "a.jsonl",
            &[
                &snapshot_line("binance", "BTC-USDT", "2024-01-01T00:00:00Z", 1),
                &snapshot_line("binance", "BTC-USDT", "2024-01-01T00:00:02Z", 2),
            ],
        );
        let b = write_lines(
            dir,
            "b.jsonl",
            &[&snapshot_line(
                "bybit",
                "BTC-USDT",
                "2024-01-01T00:00:01Z",
                1,
            )],
        );

        let mut source = FileBackedPlaybackSource::new(vec![a, b], PlaybackFilter::default());
        source.connect().unwrap();

        let first = source.next_snapshot().unwrap().unwrap();
        let second = source.next_snapshot().unwrap().unwrap();
        let third = source.next_snapshot().unwrap().unwrap();
        assert!(source.next_snapshot().unwrap().is_none());

        assert_eq!(first.venue, "binance");
        assert_eq!(second.venue, "bybit");
        assert_eq!(third.venue, "binance");
        assert!(first.timestamp <= second.timestamp);
        assert!(second.timestamp <= third.timestamp);
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let a = write_lines(
            dir,
            "a.jsonl",
            &[
                "not json",
                &snapshot_line("binance", "BTC-USDT", "2024-01-01T00:00:00Z", 1),
            ],
        );
        let mut source = FileBackedPlaybackSource::new(vec![a], PlaybackFilter::default());
        source.connect().unwrap();
        let snap = source.next_snapshot().unwrap().unwrap();
        assert_eq!(snap.sequence, 1);
        assert!(source.next_snapshot().unwrap().is_none());
    }

    #[test]
    fn filter_excludes_non_matching_venue() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let a = write_lines(
            dir,
            "a.jsonl",
            &[&snapshot_line(
                "binance",
                "BTC-USDT",
                "2024-01-01T00:00:00Z",
                1,
            )],
        );
        let filter = PlaybackFilter {
            venues: Some(["bybit".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let mut source = FileBackedPlaybackSource::new(vec![a], filter);
        source.connect().unwrap();
        assert!(source.next_snapshot().unwrap().is_none());
    }

    #[test]
    fn count_does_not_consume_iteration() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let a = write_lines(
            dir,
            "a.jsonl",
            &[&snapshot_line(
                "binance",
                "BTC-USDT",
                "2024-01-01T00:00:00Z",
                1,
            )],
        );
        let mut source = FileBackedPlaybackSource::new(vec![a], PlaybackFilter::default());
        assert_eq!(source.count().unwrap(), 1);
        source.connect().unwrap();
        assert!(source.next_snapshot().unwrap().is_some());
    }
}
