//! The ephemeral store.
//!
//! An [`EphemeralStore`] keeps encoded values in a flat
//! [`PreferenceBackend`]. The backend is safe to use from any thread, so
//! operations run on the caller's thread and observers are notified inline,
//! before the mutating call returns. Only this instance's own writes notify
//! its observers. Write times are not tracked.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::observer::{self, ObserverRegistry};
use crate::store::Store;
use crate::types::Timestamp;
use cachestore_codec::{CborCodec, Codec};
use cachestore_storage::{MemoryPreferences, PreferenceBackend};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// A [`Store`] over a flat preference map.
pub struct EphemeralStore<C: Codec = CborCodec> {
    backend: Arc<dyn PreferenceBackend>,
    codec: C,
    config: StoreConfig,
    observers: ObserverRegistry,
}

impl EphemeralStore<CborCodec> {
    /// Creates a CBOR-encoded store over `backend`.
    pub fn new(backend: Arc<dyn PreferenceBackend>) -> Self {
        Self::open(backend, CborCodec::new(), StoreConfig::default())
    }

    /// Creates a CBOR-encoded store over a fresh in-memory map.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferences::new()))
    }
}

impl<C: Codec> EphemeralStore<C> {
    /// Creates a store over `backend`.
    ///
    /// `config.collection` is ignored; the store owns the whole map.
    pub fn open(backend: Arc<dyn PreferenceBackend>, codec: C, config: StoreConfig) -> Self {
        debug!(codec = codec.name(), "ephemeral store opened");
        Self {
            backend,
            codec,
            config,
            observers: ObserverRegistry::new(),
        }
    }

    /// Returns the backing preference map.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn PreferenceBackend> {
        &self.backend
    }

    /// Returns the codec.
    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns every key in the store, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.backend.keys()
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Persists pending writes of a file-backed map.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the map cannot be written.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    fn notify(&self, key: &str) {
        let matched = self.observers.matching(key);
        if !matched.is_empty() {
            observer::notify(key, &matched);
        }
    }
}

impl<C: Codec> Store for EphemeralStore<C> {
    fn save<T: Serialize + ?Sized>(&self, value: &T, key: &str) -> CoreResult<()> {
        let payload = self
            .codec
            .encode(value)
            .map_err(|e| CoreError::encoding(key, e))?;
        self.backend.set(key, &payload);
        self.notify(key);
        Ok(())
    }

    fn data<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        self.backend
            .get(key)
            .map(|payload| {
                self.codec
                    .decode(&payload)
                    .map_err(|e| CoreError::decoding(key, e))
            })
            .transpose()
    }

    fn last_updated_at(&self, _key: &str) -> CoreResult<Option<Timestamp>> {
        Ok(None)
    }

    fn delete_data(&self, key: &str) -> CoreResult<()> {
        self.backend.remove(key);
        self.notify(key);
        Ok(())
    }

    fn start_observing_updates<F>(&self, key: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        trace!(key, "observer registered");
        self.observers.register(key, Arc::new(callback));
    }

    fn clear(&self) -> CoreResult<()> {
        let removed = self.backend.clear();
        debug!(removed = removed.len(), "ephemeral store cleared");
        if self.config.notify_on_clear {
            for key in &removed {
                self.notify(key);
            }
        }
        Ok(())
    }
}

impl<C: Codec> std::fmt::Debug for EphemeralStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("codec", &self.codec.name())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
