//! Seen-line cache
//!
//! [`DedupCache`] remembers fingerprints of lines a watcher has already
//! analyzed. It is not an LRU and not a time window: once it holds more than
//! `capacity` fingerprints it is cleared wholesale before the next insert,
//! so memory stays bounded and suppression state starts over.
//!
//! Fingerprints are 64-bit hashes of the raw line text. A collision makes a
//! new line look like a repeat and suppresses it.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Default number of fingerprints held before a clear
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded set of line fingerprints, owned by a single watcher
#[derive(Debug)]
pub struct DedupCache {
    seen: HashSet<u64>,
    capacity: usize,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Records `line` and reports whether it was new.
    ///
    /// Returns `false` when the fingerprint is already present. Otherwise the
    /// cache is cleared first if it has grown past capacity, the fingerprint is
    /// inserted, and `true` is returned.
    pub fn check_and_insert(&mut self, line: &str) -> bool {
        let fingerprint = fingerprint(line);
        if self.seen.contains(&fingerprint) {
            return false;
        }

        if self.seen.len() > self.capacity {
            tracing::debug!(
                entries = self.seen.len(),
                capacity = self.capacity,
                "dedup cache over capacity, clearing"
            );
            self.seen.clear();
        }
        self.seen.insert(fingerprint);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Content fingerprint of a raw line.
pub fn fingerprint(line: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    hasher.finish()
}
