//! Store construction.

use crate::config::{Config, StoreConfig};
use crate::durable::DurableStore;
use crate::engine::Engine;
use crate::ephemeral::EphemeralStore;
use crate::error::CoreResult;
use crate::store::Store;
use crate::types::Timestamp;
use cachestore_storage::FilePreferences;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which store [`StoreFactory::open`] builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    /// Durable store over the cache directory at `path`.
    Durable {
        /// Cache directory.
        path: PathBuf,
    },
    /// Durable store over an in-memory journal.
    DurableInMemory,
    /// Ephemeral store over the preference file at `path`.
    Ephemeral {
        /// Preference file.
        path: PathBuf,
    },
    /// Ephemeral store over an in-memory map.
    EphemeralInMemory,
}

/// Either store variant behind one type.
#[derive(Debug)]
pub enum AnyStore {
    /// A durable store.
    Durable(DurableStore),
    /// An ephemeral store.
    Ephemeral(EphemeralStore),
}

impl Store for AnyStore {
    fn save<T: Serialize + ?Sized>(&self, value: &T, key: &str) -> CoreResult<()> {
        match self {
            Self::Durable(store) => store.save(value, key),
            Self::Ephemeral(store) => store.save(value, key),
        }
    }

    fn data<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        match self {
            Self::Durable(store) => store.data(key),
            Self::Ephemeral(store) => store.data(key),
        }
    }

    fn last_updated_at(&self, key: &str) -> CoreResult<Option<Timestamp>> {
        match self {
            Self::Durable(store) => store.last_updated_at(key),
            Self::Ephemeral(store) => store.last_updated_at(key),
        }
    }

    fn delete_data(&self, key: &str) -> CoreResult<()> {
        match self {
            Self::Durable(store) => store.delete_data(key),
            Self::Ephemeral(store) => store.delete_data(key),
        }
    }

    fn start_observing_updates<F>(&self, key: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        match self {
            Self::Durable(store) => store.start_observing_updates(key, callback),
            Self::Ephemeral(store) => store.start_observing_updates(key, callback),
        }
    }

    fn clear(&self) -> CoreResult<()> {
        match self {
            Self::Durable(store) => store.clear(),
            Self::Ephemeral(store) => store.clear(),
        }
    }
}

/// Builds configured stores.
///
/// # Example
///
/// ```rust,ignore
/// use cachestore_core::{Store, StoreFactory};
///
/// let cache = StoreFactory::cache_store(Path::new("cache"))?;
/// cache.save(&settings, "settings")?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFactory;

impl StoreFactory {
    /// Opens a durable store over the cache directory at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be opened.
    pub fn cache_store(dir: &Path) -> CoreResult<DurableStore> {
        DurableStore::new(Engine::open(dir, Config::default())?)
    }

    /// Opens a durable store over a fresh in-memory engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine's threads cannot be spawned.
    pub fn cache_store_in_memory() -> CoreResult<DurableStore> {
        DurableStore::new(Engine::open_in_memory()?)
    }

    /// Opens a durable store over an existing engine.
    ///
    /// Several stores may share one engine; each sees every commit to its
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's threads cannot be spawned.
    pub fn cache_store_with(engine: Arc<Engine>, config: StoreConfig) -> CoreResult<DurableStore> {
        DurableStore::open(engine, cachestore_codec::CborCodec::new(), config)
    }

    /// Opens an ephemeral store over the preference file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn default_store(path: &Path) -> CoreResult<EphemeralStore> {
        Ok(EphemeralStore::new(Arc::new(FilePreferences::open(path)?)))
    }

    /// Opens an ephemeral store over a fresh in-memory map.
    #[must_use]
    pub fn default_store_in_memory() -> EphemeralStore {
        EphemeralStore::in_memory()
    }

    /// Opens the store described by `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be opened.
    pub fn open(kind: StoreKind) -> CoreResult<AnyStore> {
        Ok(match kind {
            StoreKind::Durable { path } => AnyStore::Durable(Self::cache_store(&path)?),
            StoreKind::DurableInMemory => AnyStore::Durable(Self::cache_store_in_memory()?),
            StoreKind::Ephemeral { path } => AnyStore::Ephemeral(Self::default_store(&path)?),
            StoreKind::EphemeralInMemory => AnyStore::Ephemeral(Self::default_store_in_memory()),
        })
    }
}
