//! Engine and store configuration.

/// Configuration for opening a cache engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the cache directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the journal on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Journal size in bytes above which a commit may trigger compaction
    /// (0 = never compact automatically).
    pub compaction_threshold: u64,

    /// Name of the designated engine thread.
    pub engine_thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            compaction_threshold: 4 * 1024 * 1024, // 4 MB
            engine_thread_name: "cachestore-engine".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the cache directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the automatic compaction threshold in bytes.
    #[must_use]
    pub const fn compaction_threshold(mut self, bytes: u64) -> Self {
        self.compaction_threshold = bytes;
        self
    }

    /// Sets the designated thread name.
    #[must_use]
    pub fn engine_thread_name(mut self, name: impl Into<String>) -> Self {
        self.engine_thread_name = name.into();
        self
    }
}

/// Per-store options shared by both store variants.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Engine collection holding this store's records (durable stores only).
    pub collection: String,

    /// Whether `clear()` notifies the observers of every removed key.
    pub notify_on_clear: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: "cache".to_string(),
            notify_on_clear: false,
        }
    }
}

impl StoreConfig {
    /// Creates a store configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine collection.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets whether `clear()` notifies observers.
    #[must_use]
    pub const fn notify_on_clear(mut self, value: bool) -> Self {
        self.notify_on_clear = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_commit);
        assert_eq!(config.engine_thread_name, "cachestore-engine");
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .sync_on_commit(false)
            .compaction_threshold(0)
            .engine_thread_name("test-engine");

        assert!(!config.sync_on_commit);
        assert_eq!(config.compaction_threshold, 0);
        assert_eq!(config.engine_thread_name, "test-engine");

        let store = StoreConfig::new().collection("tokens").notify_on_clear(true);
        assert_eq!(store.collection, "tokens");
        assert!(store.notify_on_clear);
        assert!(!StoreConfig::default().notify_on_clear);
    }
}
