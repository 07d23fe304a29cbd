//! Rolling request history for one channel.
//!
//! A fixed-capacity ring buffer: entries live in a preallocated arena and are
//! addressed by a head index, so the ledger never grows past its capacity and
//! pruning is a pop from the front.

use std::time::Duration;

use tokio::time::Instant;

/// How long entries are kept.
pub const LEDGER_WINDOW: Duration = Duration::from_secs(3600);

/// One past outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHistoryEntry {
    pub timestamp: Instant,
    pub url: String,
}

/// Chronological ring buffer of request history entries.
#[derive(Debug)]
pub struct RequestLedger {
    slots: Vec<Option<RequestHistoryEntry>>,
    head: usize,
    len: usize,
}

impl RequestLedger {
    /// Create a ledger holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Append an entry. When full, the oldest entry is overwritten.
    pub fn push(&mut self, timestamp: Instant, url: impl Into<String>) {
        let entry = RequestHistoryEntry {
            timestamp,
            url: url.into(),
        };
        if self.len == self.slots.len() {
            self.slots[self.head] = Some(entry);
            self.head = self.slot(1);
        } else {
            let idx = self.slot(self.len);
            self.slots[idx] = Some(entry);
            self.len += 1;
        }
    }

    /// Drop entries older than `window` before `now`. Returns how many were removed.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let mut removed = 0;
        while let Some(oldest) = self.oldest() {
            if now.saturating_duration_since(oldest.timestamp) < window {
                break;
            }
            self.slots[self.head] = None;
            self.head = self.slot(1);
            self.len -= 1;
            removed += 1;
        }
        removed
    }

    pub fn oldest(&self) -> Option<&RequestHistoryEntry> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Number of entries recorded within `window` before `now`.
    pub fn count_within(&self, now: Instant, window: Duration) -> usize {
        // Entries are chronological, so count from the newest end.
        let mut count = 0;
        for offset in (0..self.len).rev() {
            match &self.slots[self.slot(offset)] {
                Some(entry) if now.saturating_duration_since(entry.timestamp) < window => {
                    count += 1
                }
                _ => break,
            }
        }
        count
    }
}
