//! Flat preference-map backends.

use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A flat key → bytes map.
///
/// This is the storage behind the ephemeral store. Operations take `&self`
/// and are safe to call from any thread; mutations are infallible from the
/// caller's point of view; persistence problems are reported by
/// [`PreferenceBackend::flush`].
pub trait PreferenceBackend: Send + Sync {
    /// Returns the bytes stored under `key`.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]);

    /// Removes `key`. Returns `true` if it was present.
    fn remove(&self, key: &str) -> bool;

    /// Returns every stored key in ascending order.
    fn keys(&self) -> Vec<String>;

    /// Removes every entry and returns the removed keys.
    fn clear(&self) -> Vec<String>;

    /// Persists pending changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be written to its backing file.
    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A preference map that lives only in memory.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryPreferences {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl PreferenceBackend for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) {
        self.entries.write().insert(key.to_string(), value.to_vec());
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn clear(&self) -> Vec<String> {
        let removed = std::mem::take(&mut *self.entries.write());
        removed.into_keys().collect()
    }
}
