//! The store contract shared by durable and ephemeral stores.

use crate::error::CoreResult;
use crate::types::Timestamp;
use serde::{de::DeserializeOwned, Serialize};

/// A key-value cache of serializable values.
///
/// Every operation is synchronous from the caller's point of view: when it
/// returns, the write is visible to later reads through the same store.
/// Observer notifications are not part of that guarantee and may fire after
/// the mutating call returns.
///
/// # Implementation Requirements
///
/// - At most one record exists per key; `save` overwrites it
/// - Deleting an absent key succeeds
/// - Implementations must be `Send + Sync` so one store can serve many threads
pub trait Store: Send + Sync {
    /// Encodes `value` and stores it under `key`, replacing any previous value.
    ///
    /// Observers of `key` are notified once the write is durable.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if the codec rejects `value` and
    /// `BackendUnavailable` if the backend cannot be reached.
    fn save<T: Serialize + ?Sized>(&self, value: &T, key: &str) -> CoreResult<()>;

    /// Returns the value stored under `key`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns `Decoding` if the stored bytes do not decode as `T` and
    /// `BackendUnavailable` if the backend cannot be reached.
    fn data<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>>;

    /// Returns when `key` was last written, if the store tracks it.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn last_updated_at(&self, key: &str) -> CoreResult<Option<Timestamp>>;

    /// Removes `key`. Removing an absent key is a no-op.
    ///
    /// Observers of `key` are notified.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn delete_data(&self, key: &str) -> CoreResult<()>;

    /// Registers `callback` to run whenever `key` is created, updated or
    /// deleted.
    ///
    /// Observers are never removed. Stores that cannot observe changes keep
    /// this default, which ignores the registration.
    fn start_observing_updates<F>(&self, key: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let _ = (key, callback);
    }

    /// Removes every record in the store.
    ///
    /// Observers are not notified unless the store was configured with
    /// `notify_on_clear`.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn clear(&self) -> CoreResult<()>;
}
