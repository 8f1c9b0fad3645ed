//! Bounds-checked wrapper over a fixed-size memory-mapped file.
//!
//! All segment I/O goes through [`MappedFile::read_at`] and
//! [`MappedFile::write_at`]; offsets are validated against the map size so
//! no raw pointer arithmetic escapes this module.

use crate::error::{LogError, Result};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;

/// A fixed-size file mapped read-write into memory.
pub struct MappedFile {
    map: MmapMut,
}

impl MappedFile {
    /// Opens `path` as a mapping of exactly `size` bytes, creating and
    /// zero-extending the file if it is absent or shorter.
    pub fn open(path: &Path, size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() < size as u64 {
            file.set_len(size as u64)?;
        }
        // SAFETY: the file is sized to at least `size` above and the mapping
        // lives as long as `self`. The store has a single in-process writer,
        // so no aliasing mutation happens through other maps.
        let map = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        Ok(Self { map })
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len)?;
        Ok(&self.map[offset..offset + len])
    }

    /// Copies `bytes` into the mapping at `offset`.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check(offset, bytes.len())?;
        self.map[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Flushes dirty pages back to the file.
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        let end = offset.checked_add(len);
        if end.map_or(true, |end| end > self.map.len()) {
            return Err(LogError::OutOfBounds {
                offset,
                len,
                map_size: self.map.len(),
            });
        }
        Ok(())
    }
}
