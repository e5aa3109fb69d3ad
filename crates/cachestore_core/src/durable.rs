//! The durable store.
//!
//! A [`DurableStore`] keeps its values as records of one engine collection.
//! Every operation runs on the engine's designated thread through
//! [`Engine::perform`], so the store can be shared freely between threads.
//!
//! Observers are driven by the engine's commit feed rather than by the
//! store's own writes: any writer committing to the collection, whether
//! another store instance or a sync component calling `perform` directly,
//! notifies the observers of the keys it touched. Callbacks run on the
//! store's callback thread, one commit at a time.

use crate::change_feed::{ChangeType, CommitEvent, SubscriptionId};
use crate::config::StoreConfig;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::executor::Executor;
use crate::observer::{self, ObserverCallback, ObserverRegistry};
use crate::record::Record;
use crate::store::Store;
use crate::types::Timestamp;
use cachestore_codec::{CborCodec, Codec};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

const CALLBACK_THREAD: &str = "cachestore-callbacks";
const LISTENER_THREAD: &str = "cachestore-listener";

/// A [`Store`] persisted in an [`Engine`].
pub struct DurableStore<C: Codec = CborCodec> {
    engine: Arc<Engine>,
    codec: C,
    config: StoreConfig,
    observers: Arc<ObserverRegistry>,
    callbacks: Arc<Executor>,
    subscription: SubscriptionId,
    listener: Option<JoinHandle<()>>,
}

impl DurableStore<CborCodec> {
    /// Opens a CBOR-encoded store over the default collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's threads cannot be spawned.
    pub fn new(engine: Arc<Engine>) -> CoreResult<Self> {
        Self::open(engine, CborCodec::new(), StoreConfig::default())
    }
}

impl<C: Codec> DurableStore<C> {
    /// Opens a store over `config.collection` of `engine`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's threads cannot be spawned.
    pub fn open(engine: Arc<Engine>, codec: C, config: StoreConfig) -> CoreResult<Self> {
        let observers = Arc::new(ObserverRegistry::new());
        let callbacks = Arc::new(Executor::new(CALLBACK_THREAD)?);

        let (subscription, events) = engine.subscribe();
        let listener = {
            let observers = Arc::clone(&observers);
            let callbacks = Arc::clone(&callbacks);
            let collection = config.collection.clone();
            let notify_on_clear = config.notify_on_clear;
            thread::Builder::new()
                .name(LISTENER_THREAD.to_string())
                .spawn(move || {
                    listen(&events, &observers, &callbacks, &collection, notify_on_clear);
                })
        };
        let listener = match listener {
            Ok(handle) => handle,
            Err(e) => {
                engine.unsubscribe(subscription);
                return Err(e.into());
            }
        };

        debug!(
            collection = %config.collection,
            codec = codec.name(),
            "durable store opened"
        );

        Ok(Self {
            engine,
            codec,
            config,
            observers,
            callbacks,
            subscription,
            listener: Some(listener),
        })
    }

    /// Returns the engine backing this store.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Returns the engine collection this store tracks.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Returns the codec.
    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Returns every key in the store, in order.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine cannot be reached.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        let collection = self.config.collection.clone();
        self.engine.perform(move |ctx| {
            Ok(ctx
                .fetch_all(&collection)?
                .into_iter()
                .map(|record| record.id.key)
                .collect())
        })
    }

    /// Returns `true` if a value is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine cannot be reached.
    pub fn contains(&self, key: &str) -> CoreResult<bool> {
        Ok(self.last_updated_at(key)?.is_some())
    }

    /// Returns how long ago `key` was last written.
    ///
    /// Stale entries are reported, never evicted.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine cannot be reached.
    pub fn age(&self, key: &str) -> CoreResult<Option<Duration>> {
        Ok(self
            .last_updated_at(key)?
            .map(|updated_at| updated_at.elapsed_at(Timestamp::now())))
    }

    fn fetch(&self, key: &str) -> CoreResult<Option<Record>> {
        let collection = self.config.collection.clone();
        let key = key.to_string();
        self.engine
            .perform(move |ctx| ctx.fetch_one(&collection, &key))
    }

    /// Runs the observers of `key` on the callback thread.
    fn notify_directly(&self, key: &str) {
        let matched = self.observers.matching(key);
        if matched.is_empty() {
            return;
        }
        let key = key.to_string();
        if let Err(e) = self
            .callbacks
            .submit(move || observer::notify(&key, &matched))
        {
            warn!(error = %e, "dropping observer notification");
        }
    }
}

impl<C: Codec> Store for DurableStore<C> {
    fn save<T: Serialize + ?Sized>(&self, value: &T, key: &str) -> CoreResult<()> {
        let payload = self
            .codec
            .encode(value)
            .map_err(|e| CoreError::encoding(key, e))?;

        let collection = self.config.collection.clone();
        let key = key.to_string();
        self.engine.perform(move |ctx| {
            ctx.upsert(&collection, &key, payload)?;
            ctx.commit()?;
            Ok(())
        })
    }

    fn data<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        self.fetch(key)?
            .map(|record| {
                self.codec
                    .decode(&record.payload)
                    .map_err(|e| CoreError::decoding(key, e))
            })
            .transpose()
    }

    fn last_updated_at(&self, key: &str) -> CoreResult<Option<Timestamp>> {
        Ok(self.fetch(key)?.map(|record| record.updated_at))
    }

    fn delete_data(&self, key: &str) -> CoreResult<()> {
        let collection = self.config.collection.clone();
        let owned_key = key.to_string();
        let removed = self.engine.perform(move |ctx| {
            let removed = ctx.delete_all(&collection, &owned_key)?;
            ctx.commit()?;
            Ok(removed)
        })?;

        // Nothing was committed, so the feed stays silent.
        if removed == 0 {
            self.notify_directly(key);
        }
        Ok(())
    }

    fn start_observing_updates<F>(&self, key: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        trace!(collection = %self.config.collection, key, "observer registered");
        self.observers.register(key, Arc::new(callback));
    }

    fn clear(&self) -> CoreResult<()> {
        let collection = self.config.collection.clone();
        let removed = self.engine.perform(move |ctx| {
            let removed = ctx.clear_collection(&collection)?;
            ctx.commit()?;
            Ok(removed)
        })?;
        debug!(collection = %self.config.collection, removed, "durable store cleared");
        Ok(())
    }
}

impl<C: Codec> Drop for DurableStore<C> {
    fn drop(&mut self) {
        // Disconnects the listener's receiver.
        self.engine.unsubscribe(self.subscription);
        if let Some(listener) = self.listener.take() {
            if listener.thread().id() != thread::current().id() {
                let _ = listener.join();
            }
        }
        self.callbacks.shutdown();
    }
}

impl<C: Codec> std::fmt::Debug for DurableStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("collection", &self.config.collection)
            .field("codec", &self.codec.name())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// Turns commit events into observer notifications until the feed
/// disconnects.
fn listen(
    events: &Receiver<Arc<CommitEvent>>,
    observers: &ObserverRegistry,
    callbacks: &Executor,
    collection: &str,
    notify_on_clear: bool,
) {
    while let Ok(event) = events.recv() {
        if observers.is_empty() {
            continue;
        }

        let matched: Vec<(String, Vec<ObserverCallback>)> = event
            .changes_in(collection)
            .filter(|(_, change)| notify_on_clear || *change != ChangeType::Clear)
            .map(|(id, _)| (id.key.clone(), observers.matching(&id.key)))
            .filter(|(_, registered)| !registered.is_empty())
            .collect();
        if matched.is_empty() {
            continue;
        }

        trace!(
            collection,
            sequence = event.sequence.as_u64(),
            keys = matched.len(),
            "dispatching commit notifications"
        );
        let dispatched = callbacks.submit(move || {
            for (key, registered) in &matched {
                observer::notify(key, registered);
            }
        });
        if dispatched.is_err() {
            break;
        }
    }
}
