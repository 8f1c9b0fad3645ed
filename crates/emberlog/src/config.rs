//! Store configuration.

use std::path::{Path, PathBuf};

/// Default capacity of a single segment file (100 MiB).
pub const DEFAULT_SEGMENT_CAPACITY: usize = 100 * 1024 * 1024;

/// Default number of segments kept on disk.
pub const DEFAULT_RETENTION_COUNT: usize = 100;

/// Default field separator in ingested lines.
pub const DEFAULT_FIELD_SEPARATOR: u8 = b'\t';

/// Configuration for a [`LogStore`](crate::LogStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base path of the segment files. The writable head segment lives at
    /// this exact path; rolled segments get a `.NNN` suffix.
    pub base_path: PathBuf,
    /// Total size of each segment file in bytes, header included.
    pub segment_capacity: usize,
    /// Maximum number of segments kept on disk at any time.
    pub retention_count: usize,
    /// Byte separating fields in ingested lines and rendered results.
    pub field_separator: u8,
}

impl StoreConfig {
    /// Creates a configuration with the given base path and default sizing.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            retention_count: DEFAULT_RETENTION_COUNT,
            field_separator: DEFAULT_FIELD_SEPARATOR,
        }
    }

    /// Sets the per-segment file capacity in bytes.
    pub fn with_segment_capacity(mut self, capacity: usize) -> Self {
        self.segment_capacity = capacity;
        self
    }

    /// Sets the maximum number of segments kept on disk.
    pub fn with_retention_count(mut self, count: usize) -> Self {
        self.retention_count = count;
        self
    }

    /// Sets the field separator byte.
    pub fn with_field_separator(mut self, separator: u8) -> Self {
        self.field_separator = separator;
        self
    }
}
