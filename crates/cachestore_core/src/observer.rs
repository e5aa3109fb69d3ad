//! Per-key observer registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

/// Callback invoked when an observed key changes.
///
/// Receives nothing; the observer re-reads the key to see the new value.
pub type ObserverCallback = Arc<dyn Fn() + Send + Sync>;

/// Key → callbacks mapping shared by both store variants.
///
/// Registrations are append-only and never deduplicated: every callback
/// registered for a key is returned by [`ObserverRegistry::matching`], in
/// registration order. Matching returns a snapshot, so callbacks may register
/// new observers while being notified.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<HashMap<String, Vec<ObserverCallback>>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `key`.
    pub fn register(&self, key: impl Into<String>, callback: ObserverCallback) {
        self.observers
            .write()
            .entry(key.into())
            .or_default()
            .push(callback);
    }

    /// Returns the callbacks registered for `key`.
    #[must_use]
    pub fn matching(&self, key: &str) -> Vec<ObserverCallback> {
        self.observers
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Returns the total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

/// Invokes `callbacks` in order on the current thread.
///
/// A panicking callback is logged and does not stop the others.
pub(crate) fn notify(key: &str, callbacks: &[ObserverCallback]) {
    for callback in callbacks {
        trace!(key, "notifying observer");
        if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            error!(key, "observer callback panicked");
        }
    }
}
