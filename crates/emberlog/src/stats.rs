//! Read-only reporting structs for stats and debug endpoints.

use crate::segment::TimeBounds;
use std::path::PathBuf;

/// Point-in-time counters for one segment.
#[derive(Debug, Clone)]
pub struct SegmentStats {
    /// Path of the backing file.
    pub path: PathBuf,
    /// Number of records in the segment.
    pub record_count: u64,
    /// Bytes used in the data region (the write cursor).
    pub bytes_used: u64,
    /// Bytes left in the data region.
    pub remaining_capacity: u64,
    /// Estimated memory footprint of the in-memory index.
    pub index_bytes: usize,
    /// Min/max timestamps of the segment's records.
    pub time_bounds: TimeBounds,
}

/// Aggregate counters across the whole store.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Number of open segments.
    pub segment_count: usize,
    /// Total records across all segments.
    pub record_count: u64,
    /// Total data-region bytes used.
    pub bytes_used: u64,
    /// Total estimated index memory.
    pub index_bytes: usize,
    /// Minimum timestamp in the store (from the oldest segment).
    pub youngest: i64,
    /// Maximum timestamp in the store (from the head segment).
    pub oldest: i64,
}

/// Ordered `(value, cardinality)` listing of one segment's index for a
/// single field.
#[derive(Debug, Clone)]
pub struct IndexListing {
    /// Path of the segment the listing came from.
    pub segment: PathBuf,
    /// Value and posting count, in byte order of the values.
    pub entries: Vec<(Vec<u8>, u64)>,
}
