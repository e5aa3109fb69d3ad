//! In-memory journal backend.

use crate::error::{StorageError, StorageResult};
use crate::journal::JournalBackend;
use parking_lot::RwLock;
use std::sync::Arc;

/// A journal held entirely in memory.
///
/// Backs in-memory engines and tests. Nothing survives the process, but the
/// byte-level behavior matches [`crate::FileJournal`], so recovery can be
/// exercised by seeding a journal with [`MemoryJournal::with_data`].
///
/// Clones share the same bytes, so a test can keep a handle to a journal it
/// hands to an engine.
///
/// # Example
///
/// ```rust
/// use cachestore_storage::{JournalBackend, MemoryJournal};
///
/// let mut journal = MemoryJournal::new();
/// assert_eq!(journal.append(b"abc").unwrap(), 0);
/// assert_eq!(journal.size().unwrap(), 3);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal that already holds `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the journal bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl JournalBackend for MemoryJournal {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        if new_size > data.len() as u64 {
            return Err(StorageError::invalid_input(format!(
                "cannot truncate journal of {} bytes to {} bytes",
                data.len(),
                new_size
            )));
        }
        data.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        *self.data.write() = bytes.to_vec();
        Ok(())
    }
}
