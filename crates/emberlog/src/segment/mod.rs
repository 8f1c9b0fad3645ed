//! Capacity-bounded, memory-mapped record segments.
//!
//! A segment is one fixed-size file:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Header (32 bytes)                          │
//! │  - record_count: u64                        │
//! │  - youngest: i64 (minimum timestamp)        │
//! │  - oldest: i64 (maximum timestamp)          │
//! │  - write_cursor: u64 (data-region offset)   │
//! ├─────────────────────────────────────────────┤
//! │  Data region: concatenated record frames    │
//! │  (see [`crate::record`])                    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The header and data live in the mapping, so appends persist without an
//! explicit write-back step. The per-field inverted index is in-memory only
//! and is rebuilt by replaying the data region whenever a segment with
//! records is opened.

pub mod index;
pub mod mapped;

use crate::error::{LogError, Result};
use crate::record::{self, DecodedRecord};
use crate::schema::FieldSchema;
use index::SegmentIndex;
use mapped::MappedFile;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Size of the segment file header in bytes.
pub const SEGMENT_HEADER_SIZE: usize = 32;

/// The running timestamp bounds of a segment.
///
/// Field naming is historical and kept for on-disk compatibility: `youngest`
/// holds the *minimum* timestamp seen by the segment and `oldest` the
/// *maximum*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBounds {
    /// Minimum timestamp of any record in the segment (0 when empty).
    pub youngest: i64,
    /// Maximum timestamp of any record in the segment (0 when empty).
    pub oldest: i64,
}

/// Fixed-width header at byte 0 of every segment file.
#[derive(Debug, Clone, Copy, Default)]
struct SegmentHeader {
    record_count: u64,
    youngest: i64,
    oldest: i64,
    write_cursor: u64,
}

impl SegmentHeader {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            record_count: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            youngest: i64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            oldest: i64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            write_cursor: u64::from_le_bytes(bytes[24..32].try_into().unwrap()),
        }
    }

    fn to_bytes(self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        bytes[0..8].copy_from_slice(&self.record_count.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.youngest.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.oldest.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.write_cursor.to_le_bytes());
        bytes
    }

    /// Widens the running bounds to cover `timestamp`.
    fn observe(&mut self, timestamp: i64) {
        if self.youngest == 0 || timestamp < self.youngest {
            self.youngest = timestamp;
        }
        if self.oldest == 0 || timestamp > self.oldest {
            self.oldest = timestamp;
        }
    }
}

/// One memory-mapped, capacity-bounded, append-only record segment plus its
/// in-memory inverted index.
pub struct Segment {
    path: PathBuf,
    file: MappedFile,
    header: SegmentHeader,
    index: SegmentIndex,
}

impl Segment {
    /// Opens the segment file at `path`, creating a zero-filled file of
    /// `capacity` bytes if absent. If the file already holds records, the
    /// entire data region is replayed to rebuild the time bounds and index.
    pub fn open(path: impl AsRef<Path>, capacity: usize, schema: &FieldSchema) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = MappedFile::open(&path, capacity)?;
        let header = SegmentHeader::from_bytes(file.read_at(0, SEGMENT_HEADER_SIZE)?);

        if header.write_cursor as usize > capacity - SEGMENT_HEADER_SIZE {
            return Err(LogError::CorruptRecord {
                offset: header.write_cursor,
                reason: "write cursor past segment capacity",
            });
        }

        let mut segment = Self {
            path,
            file,
            header,
            index: SegmentIndex::new(),
        };
        if segment.header.record_count > 0 {
            segment.replay(schema)?;
        }
        Ok(segment)
    }

    /// Rebuilds time bounds and index by decoding every record in the data
    /// region. Mandatory on open since neither index nor bounds drift is
    /// persisted with the postings.
    fn replay(&mut self, schema: &FieldSchema) -> Result<()> {
        let record_count = self.header.record_count;
        let cursor = self.header.write_cursor as usize;
        let mut bounds = SegmentHeader {
            record_count,
            write_cursor: self.header.write_cursor,
            ..Default::default()
        };

        let data = self.file.read_at(SEGMENT_HEADER_SIZE, cursor)?;
        let mut offset = 0usize;
        for n in 0..record_count {
            let decoded = record::decode(data, offset, cursor)?;
            if decoded.record.fields().len() != schema.len() && !schema.is_empty() {
                // Field-count drift is tolerated on ingest, so only worth a note here.
                debug!(
                    offset,
                    fields = decoded.record.fields().len(),
                    "record field count differs from schema"
                );
            }
            for position in schema.indexed_positions() {
                if let Some(value) = decoded.record.field(position) {
                    if let Some(name) = schema.field_name(position) {
                        self.index
                            .insert(name, value, offset as u64, decoded.timestamp);
                    }
                }
            }
            bounds.observe(decoded.timestamp);
            offset += decoded.len;
            if (n + 1) % 100_000 == 0 {
                debug!(
                    path = %self.path.display(),
                    replayed = n + 1,
                    total = record_count,
                    "index replay in progress"
                );
            }
        }

        if offset as u64 != self.header.write_cursor {
            warn!(
                path = %self.path.display(),
                replayed_bytes = offset,
                write_cursor = self.header.write_cursor,
                "replay ended short of the write cursor"
            );
        }
        self.header = bounds;
        debug!(
            path = %self.path.display(),
            records = record_count,
            bytes = offset,
            index_bytes = self.index.mem_size(),
            "segment opened"
        );
        Ok(())
    }

    /// Appends one raw line, split on `separator` per the schema.
    ///
    /// Fails with [`LogError::SegmentFull`] when the encoded record does not
    /// fit; the caller rotates and retries. No partial write happens.
    /// Returns the data-region offset the record was written at.
    pub fn append(&mut self, line: &[u8], schema: &FieldSchema, separator: u8) -> Result<u64> {
        let fields = record::split_line(line, separator);
        let encoded = record::encode(&fields);

        let remaining = self.remaining_capacity();
        if encoded.bytes.len() > remaining {
            return Err(LogError::SegmentFull {
                needed: encoded.bytes.len(),
                remaining,
            });
        }

        let offset = self.header.write_cursor;
        self.file
            .write_at(SEGMENT_HEADER_SIZE + offset as usize, &encoded.bytes)?;

        self.header.record_count += 1;
        self.header.write_cursor += encoded.bytes.len() as u64;
        self.header.observe(encoded.timestamp);
        self.file.write_at(0, &self.header.to_bytes())?;

        for position in schema.indexed_positions() {
            if let Some(value) = fields.get(position) {
                if let Some(name) = schema.field_name(position) {
                    self.index.insert(name, value, offset, encoded.timestamp);
                }
            }
        }
        Ok(offset)
    }

    /// Decodes the record at a data-region `offset`.
    pub fn decode_at(&self, offset: u64) -> Result<DecodedRecord> {
        let cursor = self.header.write_cursor as usize;
        let data = self.file.read_at(SEGMENT_HEADER_SIZE, cursor)?;
        record::decode(data, offset as usize, cursor)
    }

    /// Renames the backing file; used by rotation. The mapping survives the
    /// rename.
    pub(crate) fn rename_to(&mut self, new_path: PathBuf) -> Result<()> {
        std::fs::rename(&self.path, &new_path)?;
        self.path = new_path;
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the segment.
    pub fn record_count(&self) -> u64 {
        self.header.record_count
    }

    /// Byte offset of the next free slot in the data region.
    pub fn write_cursor(&self) -> u64 {
        self.header.write_cursor
    }

    /// Bytes left in the data region.
    pub fn remaining_capacity(&self) -> usize {
        self.file.len() - SEGMENT_HEADER_SIZE - self.header.write_cursor as usize
    }

    /// Running min/max timestamps of the segment's records.
    pub fn time_bounds(&self) -> TimeBounds {
        TimeBounds {
            youngest: self.header.youngest,
            oldest: self.header.oldest,
        }
    }

    /// The segment's in-memory inverted index.
    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// Flushes dirty pages of the mapping back to the file.
    pub fn flush(&self) -> Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn schema() -> FieldSchema {
        FieldSchema::new(&["ts", "user", "action"], &["action"])
    }

    #[test]
    fn test_append_advances_cursor_and_bounds() {
        let dir = TempDir::new().unwrap();
        let mut seg = Segment::open(dir.path().join("db"), 4096, &schema()).unwrap();

        let off1 = seg.append(b"200\talice\tlogin", &schema(), b'\t').unwrap();
        let off2 = seg.append(b"100\tbob\tlogout", &schema(), b'\t').unwrap();

        assert_eq!(off1, 0);
        assert!(off2 > off1);
        assert_eq!(seg.record_count(), 2);
        // youngest tracks the minimum, oldest the maximum.
        assert_eq!(
            seg.time_bounds(),
            TimeBounds {
                youngest: 100,
                oldest: 200
            }
        );
        assert_eq!(
            seg.remaining_capacity(),
            4096 - SEGMENT_HEADER_SIZE - seg.write_cursor() as usize
        );
    }

    #[test]
    fn test_segment_full_leaves_no_partial_write() {
        let dir = TempDir::new().unwrap();
        // Room for exactly one "100\talice\tlogin" frame (24 bytes).
        let capacity = SEGMENT_HEADER_SIZE + 24;
        let mut seg = Segment::open(dir.path().join("db"), capacity, &schema()).unwrap();

        seg.append(b"100\talice\tlogin", &schema(), b'\t').unwrap();
        let err = seg.append(b"200\tbob\tlogin", &schema(), b'\t').unwrap_err();
        assert!(matches!(err, LogError::SegmentFull { .. }));
        assert_eq!(seg.record_count(), 1);
        assert_eq!(seg.remaining_capacity(), 0);
    }

    #[test]
    fn test_replay_rebuilds_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");

        {
            let mut seg = Segment::open(&path, 4096, &schema()).unwrap();
            seg.append(b"100\talice\tlogin", &schema(), b'\t').unwrap();
            seg.append(b"200\tbob\tlogin", &schema(), b'\t').unwrap();
            seg.append(b"300\talice\tlogout", &schema(), b'\t').unwrap();
            seg.flush().unwrap();
        }

        let seg = Segment::open(&path, 4096, &schema()).unwrap();
        assert_eq!(seg.record_count(), 3);
        assert_eq!(seg.index().cardinality("action", b"login"), 2);
        assert_eq!(seg.index().cardinality("action", b"logout"), 1);
        assert_eq!(
            seg.time_bounds(),
            TimeBounds {
                youngest: 100,
                oldest: 300
            }
        );

        let decoded = seg.decode_at(0).unwrap();
        assert_eq!(decoded.record.join(b'\t'), b"100\talice\tlogin".to_vec());
    }

    #[test]
    fn test_short_record_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let mut seg = Segment::open(dir.path().join("db"), 4096, &schema()).unwrap();
        // Missing trailing fields: indexed "action" is simply absent.
        seg.append(b"100\tonlyuser", &schema(), b'\t').unwrap();
        assert_eq!(seg.record_count(), 1);
        assert_eq!(seg.index().values("action").count(), 0);
    }
}
