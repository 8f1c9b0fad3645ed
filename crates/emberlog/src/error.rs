//! Error and Result types for log store operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for log store operations.
pub type Result<T> = std::result::Result<T, LogError>;

/// The error type for log store operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// A record frame would read past the segment's write cursor, or its
    /// length field is smaller than the frame header.
    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord {
        /// Data-region offset of the bad frame.
        offset: u64,
        /// What made the frame unreadable.
        reason: &'static str,
    },

    /// The segment has no room for the encoded record.
    ///
    /// Resolved internally by [`SegmentStore`](crate::SegmentStore) rotation;
    /// callers of the store never observe it.
    #[error("Segment full: record needs {needed} bytes, {remaining} remaining")]
    SegmentFull {
        /// Encoded size of the record that did not fit.
        needed: usize,
        /// Bytes left in the segment's data region.
        remaining: usize,
    },

    /// A single encoded record exceeds the data capacity of an empty segment.
    ///
    /// This is a configuration error: no amount of rotation can make the
    /// record fit.
    #[error("Record of {record_len} bytes cannot fit an empty segment (data capacity {data_capacity})")]
    RecordTooLarge {
        /// Encoded size of the record.
        record_len: usize,
        /// Capacity of a segment's data region.
        data_capacity: usize,
    },

    /// Out-of-bounds access through the mapped-file wrapper.
    #[error("Mapped access out of bounds: offset {offset} len {len}, map size {map_size}")]
    OutOfBounds {
        /// Requested byte offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Size of the mapping.
        map_size: usize,
    },

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LogError {
    /// Returns true for errors the process cannot recover from.
    ///
    /// `SegmentFull` is handled by rotation and `CorruptRecord` degrades the
    /// affected candidate during a query; everything else means the store
    /// itself is unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LogError::SegmentFull { .. } | LogError::CorruptRecord { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_split() {
        assert!(!LogError::SegmentFull {
            needed: 10,
            remaining: 0
        }
        .is_fatal());
        assert!(!LogError::CorruptRecord {
            offset: 0,
            reason: "truncated frame"
        }
        .is_fatal());
        assert!(LogError::RecordTooLarge {
            record_len: 100,
            data_capacity: 10
        }
        .is_fatal());
        assert!(LogError::Io(io::Error::other("disk gone")).is_fatal());
    }
}
