use std::cell::Cell;

use crate::common::{RecordId, Result};
use crate::relation::{RelationSource, TupleIter};

/// An in-memory relation.
///
/// Counts how often it has been scanned, so callers can check that an
/// index was loaded from disk rather than rebuilt.
#[derive(Debug, Default)]
pub struct MemRelation {
    name: String,
    tuples: Vec<(RecordId, Vec<u8>)>,
    scans: Cell<usize>,
}

impl MemRelation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, rid: RecordId, tuple: Vec<u8>) {
        self.tuples.push((rid, tuple));
    }

    /// Append a tuple holding `key` at byte `offset`, zero-padded before it.
    pub fn push_key(&mut self, rid: RecordId, offset: usize, key: i32) {
        let mut tuple = vec![0u8; offset];
        tuple.extend_from_slice(&key.to_le_bytes());
        self.push(rid, tuple);
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn scan_count(&self) -> usize {
        self.scans.get()
    }
}

impl RelationSource for MemRelation {
    fn relation_name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> Result<TupleIter<'_>> {
        self.scans.set(self.scans.get() + 1);
        Ok(Box::new(self.tuples.iter().cloned().map(Ok)))
    }
}
