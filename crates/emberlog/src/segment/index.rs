//! Per-segment in-memory inverted index.
//!
//! For every indexed field the index maps field values to an ordered set of
//! `(offset, timestamp)` postings. Record offsets only ever increase within
//! a segment, so insertion is always at the tail of a posting list and
//! "descending by offset" is "most-recent-first" — the traversal order the
//! query engine wants.
//!
//! The index is never persisted; it lives and dies with its segment and is
//! rebuilt by replaying the record log on open.

use std::collections::{BTreeMap, HashMap};

/// Size charged per posting in the memory estimate (two machine words).
const POSTING_COST: usize = 2 * std::mem::size_of::<usize>();

/// Inverted index over the indexed fields of one segment.
#[derive(Debug, Default)]
pub struct SegmentIndex {
    /// field name -> field value -> postings ordered by ascending offset.
    fields: HashMap<String, BTreeMap<Vec<u8>, Vec<(u64, i64)>>>,
    mem_size: usize,
}

impl SegmentIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a posting for `(field, value)`.
    ///
    /// Offsets must arrive in increasing order; the posting list stays
    /// sorted without any re-sort.
    pub fn insert(&mut self, field: &str, value: &[u8], offset: u64, timestamp: i64) {
        let values = self.fields.entry(field.to_string()).or_default();
        if !values.contains_key(value) {
            self.mem_size += value.len();
        }
        let postings = values.entry(value.to_vec()).or_default();
        debug_assert!(postings.last().map_or(true, |(last, _)| *last < offset));
        postings.push((offset, timestamp));
        self.mem_size += POSTING_COST;
    }

    /// Number of postings for `(field, value)`; 0 if the value is absent.
    pub fn cardinality(&self, field: &str, value: &[u8]) -> u64 {
        self.postings(field, value).len() as u64
    }

    /// Returns true if `(field, value)` has a posting at exactly `offset`.
    pub fn contains_at(&self, field: &str, value: &[u8], offset: u64) -> bool {
        self.postings(field, value)
            .binary_search_by_key(&offset, |(off, _)| *off)
            .is_ok()
    }

    /// Yields postings for `(field, value)` in strictly decreasing offset
    /// order, starting below `upper_bound` (exclusive).
    pub fn iter_descending_from(
        &self,
        field: &str,
        value: &[u8],
        upper_bound: u64,
    ) -> impl Iterator<Item = (u64, i64)> + '_ {
        let postings = self.postings(field, value);
        let end = postings.partition_point(|(off, _)| *off < upper_bound);
        postings[..end].iter().rev().copied()
    }

    /// Ordered iteration over `(value, cardinality)` pairs for a field.
    /// Values come out in byte order.
    pub fn values(&self, field: &str) -> impl Iterator<Item = (&[u8], u64)> + '_ {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|values| values.iter())
            .map(|(value, postings)| (value.as_slice(), postings.len() as u64))
    }

    /// Rough estimate of the index's memory footprint in bytes.
    pub fn mem_size(&self) -> usize {
        self.mem_size
    }

    fn postings(&self, field: &str, value: &[u8]) -> &[(u64, i64)] {
        self.fields
            .get(field)
            .and_then(|values| values.get(value))
            .map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SegmentIndex {
        let mut index = SegmentIndex::new();
        index.insert("action", b"login", 0, 100);
        index.insert("action", b"login", 24, 200);
        index.insert("action", b"logout", 48, 300);
        index.insert("user", b"alice", 0, 100);
        index
    }

    #[test]
    fn test_cardinality() {
        let index = sample();
        assert_eq!(index.cardinality("action", b"login"), 2);
        assert_eq!(index.cardinality("action", b"logout"), 1);
        assert_eq!(index.cardinality("action", b"missing"), 0);
        assert_eq!(index.cardinality("nosuchfield", b"login"), 0);
    }

    #[test]
    fn test_contains_at() {
        let index = sample();
        assert!(index.contains_at("action", b"login", 24));
        assert!(!index.contains_at("action", b"login", 48));
        assert!(!index.contains_at("action", b"missing", 0));
    }

    #[test]
    fn test_descending_iteration_respects_bound() {
        let index = sample();
        let all: Vec<u64> = index
            .iter_descending_from("action", b"login", u64::MAX)
            .map(|(off, _)| off)
            .collect();
        assert_eq!(all, vec![24, 0]);

        // The bound is exclusive.
        let below: Vec<u64> = index
            .iter_descending_from("action", b"login", 24)
            .map(|(off, _)| off)
            .collect();
        assert_eq!(below, vec![0]);

        assert_eq!(index.iter_descending_from("action", b"login", 0).count(), 0);
    }

    #[test]
    fn test_values_iterate_in_byte_order() {
        let index = sample();
        let listed: Vec<(Vec<u8>, u64)> = index
            .values("action")
            .map(|(v, c)| (v.to_vec(), c))
            .collect();
        assert_eq!(
            listed,
            vec![(b"login".to_vec(), 2), (b"logout".to_vec(), 1)]
        );
        assert_eq!(index.values("nosuchfield").count(), 0);
    }

    #[test]
    fn test_mem_size_grows() {
        let mut index = SegmentIndex::new();
        assert_eq!(index.mem_size(), 0);
        index.insert("f", b"value", 0, 1);
        let after_first = index.mem_size();
        assert!(after_first >= b"value".len() + POSTING_COST);
        // Existing key: only the posting cost is added.
        index.insert("f", b"value", 8, 2);
        assert_eq!(index.mem_size(), after_first + POSTING_COST);
    }
}
