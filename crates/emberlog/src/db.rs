//! The top-level log store: one owner for configuration, schema, and the
//! segment list, passed by reference to the ingestion and query entry
//! points. No ambient globals.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::query::{self, SearchQuery};
use crate::record::Record;
use crate::schema::FieldSchema;
use crate::stats::{IndexListing, SegmentStats, StoreStats};
use crate::store::SegmentStore;

/// An embedded, segmented, indexed event log.
///
/// Single-writer by design: all ingestion goes through `&mut self`, queries
/// never mutate, and there is no internal locking.
pub struct LogStore {
    config: StoreConfig,
    schema: FieldSchema,
    store: SegmentStore,
}

impl LogStore {
    /// Opens the store, discovering existing segments (and replaying their
    /// record logs into fresh indexes) or creating an empty head segment.
    pub fn open(config: StoreConfig, schema: FieldSchema) -> Result<Self> {
        let store = SegmentStore::open_or_create(&config, &schema)?;
        Ok(Self {
            config,
            schema,
            store,
        })
    }

    /// Ingests a buffer of newline-terminated lines, appending one record
    /// per complete line. Trailing bytes without a terminator are dropped.
    /// Returns the number of lines ingested.
    pub fn ingest(&mut self, buf: &[u8]) -> Result<usize> {
        let mut count = 0;
        let mut start = 0;
        for (i, b) in buf.iter().enumerate() {
            if *b == b'\n' {
                self.store.append(&buf[start..i], &self.schema)?;
                count += 1;
                start = i + 1;
            }
        }
        Ok(count)
    }

    /// Appends a single record from one raw line (no trailing newline).
    pub fn append_line(&mut self, line: &[u8]) -> Result<u64> {
        self.store.append(line, &self.schema)
    }

    /// Evaluates a query, returning up to `limit` matching records,
    /// most-recent-first.
    pub fn search(&self, query: &SearchQuery) -> Vec<Record> {
        query::execute(&self.store, query)
    }

    /// Like [`search`](Self::search), but renders each match as a
    /// separator-joined, newline-terminated line.
    pub fn search_lines(&self, query: &SearchQuery) -> Vec<u8> {
        let mut out = Vec::new();
        for record in self.search(query) {
            out.extend_from_slice(&record.join(self.config.field_separator));
            out.push(b'\n');
        }
        out
    }

    /// The store's field schema.
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// The store's configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying segment store, newest segment first.
    pub fn segments(&self) -> &SegmentStore {
        &self.store
    }

    /// Per-segment counters, newest first.
    pub fn segment_stats(&self) -> Vec<SegmentStats> {
        self.store
            .segments()
            .map(|seg| SegmentStats {
                path: seg.path().to_path_buf(),
                record_count: seg.record_count(),
                bytes_used: seg.write_cursor(),
                remaining_capacity: seg.remaining_capacity() as u64,
                index_bytes: seg.index().mem_size(),
                time_bounds: seg.time_bounds(),
            })
            .collect()
    }

    /// Aggregate counters across the store. The store-wide bounds come from
    /// the head (maximum) and tail (minimum) segments.
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            segment_count: self.store.len(),
            record_count: 0,
            bytes_used: 0,
            index_bytes: 0,
            youngest: self.store.tail().time_bounds().youngest,
            oldest: self.store.head().time_bounds().oldest,
        };
        for seg in self.store.segments() {
            stats.record_count += seg.record_count();
            stats.bytes_used += seg.write_cursor();
            stats.index_bytes += seg.index().mem_size();
        }
        stats
    }

    /// Per-segment `(value, cardinality)` listings for one indexed field,
    /// newest segment first.
    pub fn index_listing(&self, field: &str) -> Vec<IndexListing> {
        self.store
            .segments()
            .map(|seg| IndexListing {
                segment: seg.path().to_path_buf(),
                entries: seg
                    .index()
                    .values(field)
                    .map(|(value, count)| (value.to_vec(), count))
                    .collect(),
            })
            .collect()
    }
}
