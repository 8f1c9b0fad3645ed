//! Segment lifecycle: discovery, ordering, rotation, and retention.
//!
//! The store owns an ordered list of segments, newest first. The head
//! segment lives at the bare base path and is the only writable one; rolled
//! segments carry a numeric suffix, `.000` being the most recently rolled.
//! A segment's life is `Head (writable)` → `Rolled (read-only)` → evicted
//! and deleted once it ages past the retention count.

use crate::config::StoreConfig;
use crate::error::{LogError, Result};
use crate::schema::FieldSchema;
use crate::segment::{Segment, SEGMENT_HEADER_SIZE};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Ordered collection of segments; the sole entry point for ingestion.
pub struct SegmentStore {
    base_path: PathBuf,
    segment_capacity: usize,
    retention_count: usize,
    separator: u8,
    /// Newest first; index 0 is the writable head.
    segments: VecDeque<Segment>,
}

impl SegmentStore {
    /// Discovers and opens existing segment files under the configured base
    /// path, creating an empty head segment if none exists.
    ///
    /// Opens the head plus rolled segments in recency order, stopping at the
    /// retention count; anything older stays untouched on disk until the
    /// next rotation cycles it out.
    pub fn open_or_create(config: &StoreConfig, schema: &FieldSchema) -> Result<Self> {
        let mut store = Self {
            base_path: config.base_path.clone(),
            segment_capacity: config.segment_capacity,
            retention_count: config.retention_count.max(1),
            separator: config.field_separator,
            segments: VecDeque::new(),
        };

        if let Some(parent) = store.base_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let head = Segment::open(&store.base_path, store.segment_capacity, schema)?;
        info!(
            path = %head.path().display(),
            records = head.record_count(),
            "opened head segment"
        );
        store.segments.push_back(head);

        for rank in 0.. {
            if store.segments.len() >= store.retention_count {
                break;
            }
            let path = store.rolled_path(rank);
            if !path.exists() {
                break;
            }
            let segment = Segment::open(&path, store.segment_capacity, schema)?;
            info!(
                path = %segment.path().display(),
                records = segment.record_count(),
                "opened rolled segment"
            );
            store.segments.push_back(segment);
        }

        Ok(store)
    }

    /// Appends one raw line to the head segment, rotating first if it is
    /// full. Returns the data-region offset within the head segment.
    ///
    /// Capacity exhaustion never escapes this method; the only errors a
    /// caller sees are fatal (I/O failure, or a record too large to fit an
    /// empty segment).
    pub fn append(&mut self, line: &[u8], schema: &FieldSchema) -> Result<u64> {
        let separator = self.separator;
        match self.head_mut().append(line, schema, separator) {
            Ok(offset) => Ok(offset),
            Err(LogError::SegmentFull { .. }) => {
                self.rotate(schema)?;
                match self.head_mut().append(line, schema, separator) {
                    // A fresh segment that still cannot hold the record is a
                    // configuration error, not a rotation trigger.
                    Err(LogError::SegmentFull { needed, .. }) => Err(LogError::RecordTooLarge {
                        record_len: needed,
                        data_capacity: self.segment_capacity - SEGMENT_HEADER_SIZE,
                    }),
                    result => result,
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Retires the head segment: evicts the oldest segment if the store is
    /// at the retention count, renumbers rolled segments oldest-first,
    /// renames the head to `.000`, and opens a fresh head.
    fn rotate(&mut self, schema: &FieldSchema) -> Result<()> {
        if self.segments.len() >= self.retention_count {
            if let Some(evicted) = self.segments.pop_back() {
                let path = evicted.path().to_path_buf();
                debug!(
                    path = %path.display(),
                    records = evicted.record_count(),
                    "evicting segment past retention"
                );
                drop(evicted);
                fs::remove_file(&path)?;
            }
        }

        // Shift every rolled segment's rank up by one, oldest first so no
        // rename clobbers a live file.
        for i in (1..self.segments.len()).rev() {
            let target = self.rolled_path(i);
            self.segments[i].rename_to(target)?;
        }
        let rolled_head = self.rolled_path(0);
        if let Some(head) = self.segments.front_mut() {
            head.rename_to(rolled_head)?;
        }

        let head = Segment::open(&self.base_path, self.segment_capacity, schema)?;
        debug!(
            path = %head.path().display(),
            segments = self.segments.len() + 1,
            "rotated in new head segment"
        );
        self.segments.push_front(head);
        Ok(())
    }

    /// All segments, newest first.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Number of open segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if no segments are open. `open_or_create` always opens
    /// the head, so an opened store reports false.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The writable head segment.
    pub fn head(&self) -> &Segment {
        &self.segments[0]
    }

    /// The oldest open segment.
    pub fn tail(&self) -> &Segment {
        &self.segments[self.segments.len() - 1]
    }

    fn head_mut(&mut self) -> &mut Segment {
        &mut self.segments[0]
    }

    /// Path of the rolled segment with the given rank (`.000` is the newest
    /// rolled segment).
    fn rolled_path(&self, rank: usize) -> PathBuf {
        let mut os: OsString = self.base_path.clone().into_os_string();
        os.push(format!(".{:03}", rank));
        PathBuf::from(os)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn schema() -> FieldSchema {
        FieldSchema::new(&["ts", "user", "action"], &["action"])
    }

    /// Capacity that fits exactly one 15-byte line ("100\talice\tlogin").
    const ONE_RECORD: usize = SEGMENT_HEADER_SIZE + 24;

    fn config(dir: &TempDir, capacity: usize, retention: usize) -> StoreConfig {
        StoreConfig::new(dir.path().join("db"))
            .with_segment_capacity(capacity)
            .with_retention_count(retention)
    }

    #[test]
    fn test_rotation_names_and_retention() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, ONE_RECORD, 2);
        let mut store = SegmentStore::open_or_create(&cfg, &schema()).unwrap();

        // Each line fills the segment far enough that the next cannot fit.
        store.append(b"100\talice\tlogin", &schema()).unwrap();
        store.append(b"200\tbob\tlogin", &schema()).unwrap();
        store.append(b"300\talice\tlogot", &schema()).unwrap();

        // Retention 2: head (record 3) and .000 (record 2); record 1 gone.
        assert_eq!(store.len(), 2);
        let base = dir.path().join("db");
        assert!(base.exists());
        assert!(dir.path().join("db.000").exists());
        assert!(!dir.path().join("db.001").exists());

        let heads: Vec<u64> = store.segments().map(Segment::record_count).collect();
        assert_eq!(heads, vec![1, 1]);
        assert_eq!(store.head().time_bounds().oldest, 300);
        assert_eq!(store.tail().time_bounds().oldest, 200);
    }

    #[test]
    fn test_rotation_retry_keeps_the_configured_separator() {
        let dir = TempDir::new().unwrap();
        // Comma-separated lines of the same 15-byte shape as ONE_RECORD.
        let cfg = config(&dir, ONE_RECORD, 2).with_field_separator(b',');
        let mut store = SegmentStore::open_or_create(&cfg, &schema()).unwrap();

        store.append(b"100,alice,login", &schema()).unwrap();
        // Full head: the retry after rotation must split on the same byte.
        store.append(b"200,bobby,login", &schema()).unwrap();

        assert_eq!(store.len(), 2);
        assert!(dir.path().join("db.000").exists());
        let head = store.head();
        assert_eq!(head.record_count(), 1);
        assert_eq!(head.index().cardinality("action", b"login"), 1);
        assert_eq!(head.time_bounds().oldest, 200);
    }

    #[test]
    fn test_append_offset_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 4096, 2);
        let mut store = SegmentStore::open_or_create(&cfg, &schema()).unwrap();

        let mut last = None;
        for i in 0..10 {
            let line = format!("{}\tuser\taction", 100 + i);
            let offset = store.append(line.as_bytes(), &schema()).unwrap();
            if let Some(last) = last {
                assert!(offset > last);
            }
            last = Some(offset);
        }
    }

    #[test]
    fn test_record_too_large_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, SEGMENT_HEADER_SIZE + 8, 2);
        let mut store = SegmentStore::open_or_create(&cfg, &schema()).unwrap();

        let err = store.append(b"100\talice\tlogin", &schema()).unwrap_err();
        assert!(matches!(err, LogError::RecordTooLarge { .. }));
        assert!(err.is_fatal());
    }
}
