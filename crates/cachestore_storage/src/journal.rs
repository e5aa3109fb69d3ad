//! Journal backend trait.

use crate::error::StorageResult;

/// An append-only byte log.
///
/// The durable engine owns the record format; a journal backend only stores
/// bytes in the order they were appended.
///
/// # Invariants
///
/// - `append` returns the offset of the first appended byte
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush` returns, appended bytes survive a process exit
/// - `replace` swaps the whole contents in one step; readers never observe a
///   half-written replacement
pub trait JournalBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not fully
    /// inside the journal, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes appended data to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current journal length in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Drops every byte after `new_size`.
    ///
    /// Used to cut off a torn tail left behind by a crash mid-append.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is larger than the journal or the
    /// truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Replaces the entire journal with `data`.
    ///
    /// Used by compaction to swap in a rewritten journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement cannot be written.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
