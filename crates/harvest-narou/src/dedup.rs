//! Run-scoped duplicate filter

use rustc_hash::FxHashSet;

use crate::record::Record;

/// Ids emitted so far in this run.
///
/// Grows for the lifetime of the value and is never persisted, so a fresh
/// run starts from an empty set.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: FxHashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only records whose id has not been seen, in input order.
    ///
    /// Ids are marked on first sight, so a repeat inside `records` is
    /// dropped as well.
    pub fn admit(&mut self, mut records: Vec<Record>) -> Vec<Record> {
        records.retain(|r| self.seen.insert(r.id.clone()));
        records
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
