//! The host-side console log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::bridge::message::LogKind;

/// Default number of entries kept before the oldest are evicted.
pub const DEFAULT_CONSOLE_CAPACITY: usize = 1000;

/// One captured console call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Position in the append order, strictly increasing.
    pub seq: u64,
    /// Entry point that produced it.
    pub kind: LogKind,
    /// Normalized arguments.
    pub payload: Vec<Value>,
    /// Capture time, never earlier than the previous entry's.
    pub timestamp: DateTime<Utc>,
    /// Materialization that produced the entry; 0 for host diagnostics.
    pub generation: u64,
}

impl LogEntry {
    /// Render the payload the way a console view shows it: strings bare,
    /// everything else as compact JSON, separated by spaces.
    pub fn text(&self) -> String {
        self.payload
            .iter()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Ordered, capped log of console entries.
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
    evicted: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CONSOLE_CAPACITY)
    }
}

impl ConsoleLog {
    /// Create a log keeping at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CONSOLE_CAPACITY)),
            capacity,
            next_seq: 0,
            evicted: 0,
            last_timestamp: None,
        }
    }

    /// Append an entry stamped with the current time.
    pub fn append(&mut self, kind: LogKind, payload: Vec<Value>, generation: u64) -> &LogEntry {
        self.append_at(kind, payload, generation, Utc::now())
    }

    /// Append an entry with an explicit capture time.
    ///
    /// A time earlier than the previous entry's is raised to it, so
    /// timestamps never decrease in append order.
    pub fn append_at(
        &mut self,
        kind: LogKind,
        payload: Vec<Value>,
        generation: u64,
        at: DateTime<Utc>,
    ) -> &LogEntry {
        let timestamp = match self.last_timestamp {
            Some(last) if at < last => last,
            _ => at,
        };
        self.last_timestamp = Some(timestamp);

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(LogEntry {
            seq,
            kind,
            payload,
            timestamp,
            generation,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in append order.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Copy of the entries in append order.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped to stay within capacity since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
