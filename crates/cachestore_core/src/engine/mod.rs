//! The persistence engine.
//!
//! An [`Engine`] keeps the committed records of every collection in memory,
//! persists each commit to the journal before applying it, and announces it
//! on the [`ChangeFeed`]. All mutation-context access happens on one
//! designated thread owned by the engine.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cachestore_core::Engine;
//!
//! let engine = Engine::open_in_memory()?;
//!
//! // From any thread: the closure runs on the designated thread.
//! engine.perform(|ctx| {
//!     ctx.upsert("cache", "greeting", b"hello".to_vec())?;
//!     ctx.commit()?;
//!     Ok(())
//! })?;
//! ```

mod context;

pub use context::MutationContext;

pub(crate) use context::PendingWrite;

use crate::change_feed::{ChangeFeed, CommitEvent, SubscriptionId};
use crate::config::Config;
use crate::dir::CacheDir;
use crate::error::{CoreError, CoreResult};
use crate::executor::Executor;
use crate::journal::{Journal, JournalRecord};
use crate::record::{Record, RecordKey};
use crate::types::{SequenceNumber, TransactionId};
use cachestore_storage::{FileJournal, JournalBackend, MemoryJournal};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Committed engine state.
#[derive(Debug, Default)]
struct EngineState {
    records: HashMap<RecordKey, Record>,
    next_txid: u64,
    last_sequence: SequenceNumber,
    /// Records currently in the journal, framing records included.
    journal_entries: u64,
}

impl EngineState {
    fn apply(&mut self, id: RecordKey, write: PendingWrite, event: &mut CommitEvent) {
        match write {
            PendingWrite::Put {
                payload,
                updated_at,
            } => {
                let record = Record::new(id.clone(), payload, updated_at);
                if self.records.insert(id, record.clone()).is_some() {
                    event.updated.push(record);
                } else {
                    event.inserted.push(record);
                }
            }
            PendingWrite::Delete { cleared } => {
                if self.records.remove(&id).is_some() {
                    if cleared {
                        event.cleared.push(id);
                    } else {
                        event.deleted.push(id);
                    }
                }
            }
        }
    }

    fn obsolete_entries(&self) -> u64 {
        self.journal_entries
            .saturating_sub(self.records.len() as u64)
    }
}

/// Engine statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Live records across all collections.
    pub records: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Records in the journal, including superseded ones.
    pub journal_entries: u64,
    /// Sequence number of the latest commit.
    pub last_sequence: SequenceNumber,
    /// Active commit-feed subscribers.
    pub subscribers: usize,
}

/// The persistence engine behind durable stores.
pub struct Engine {
    config: Config,
    dir: Option<CacheDir>,
    journal: Journal,
    state: Mutex<EngineState>,
    feed: ChangeFeed,
    executor: Executor,
    is_open: AtomicBool,
}

impl Engine {
    /// Opens the cache directory at `path` and recovers its journal.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the cache locked (`CacheLocked`)
    /// - The directory is missing and `create_if_missing` is false
    /// - The journal is corrupted (`JournalCorruption`, `ChecksumMismatch`)
    /// - I/O errors occur
    pub fn open(path: &Path, config: Config) -> CoreResult<Arc<Self>> {
        let dir = CacheDir::open(path, config.create_if_missing)?;
        let backend = FileJournal::open(&dir.journal_path())?;
        Self::build(config, Some(dir), Box::new(backend))
    }

    /// Opens an engine over an existing journal backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be recovered.
    pub fn open_with_backend(
        config: Config,
        backend: Box<dyn JournalBackend>,
    ) -> CoreResult<Arc<Self>> {
        Self::build(config, None, backend)
    }

    /// Opens a fresh engine whose journal lives in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the designated thread cannot be spawned.
    pub fn open_in_memory() -> CoreResult<Arc<Self>> {
        Self::open_with_backend(Config::default(), Box::new(MemoryJournal::new()))
    }

    fn build(
        config: Config,
        dir: Option<CacheDir>,
        backend: Box<dyn JournalBackend>,
    ) -> CoreResult<Arc<Self>> {
        let journal = Journal::new(backend, config.sync_on_commit);
        let torn_path = dir.as_ref().map(CacheDir::torn_path);
        let state = Self::recover(&journal, torn_path.as_deref())?;
        let executor = Executor::new(config.engine_thread_name.clone())?;

        info!(
            records = state.records.len(),
            sequence = state.last_sequence.as_u64(),
            path = ?dir.as_ref().map(CacheDir::path),
            "cache engine opened"
        );

        Ok(Arc::new(Self {
            config,
            dir,
            journal,
            state: Mutex::new(state),
            feed: ChangeFeed::new(),
            executor,
            is_open: AtomicBool::new(true),
        }))
    }

    /// Replays committed transactions from the journal.
    ///
    /// A torn tail is copied to `torn_path`, when given, before it is cut off.
    fn recover(journal: &Journal, torn_path: Option<&Path>) -> CoreResult<EngineState> {
        let mut state = EngineState::default();
        let mut open: HashMap<TransactionId, Vec<(RecordKey, PendingWrite)>> = HashMap::new();
        let mut max_txid = 0u64;

        let (torn, valid_len) = {
            let mut iter = journal.iter()?;
            for item in iter.by_ref() {
                let (_, record) = item?;
                state.journal_entries += 1;
                max_txid = max_txid.max(record.txid().as_u64());

                match record {
                    JournalRecord::Begin { txid } => {
                        open.insert(txid, Vec::new());
                    }
                    JournalRecord::Upsert {
                        txid,
                        id,
                        updated_at,
                        payload,
                    } => {
                        if let Some(ops) = open.get_mut(&txid) {
                            ops.push((
                                id,
                                PendingWrite::Put {
                                    payload,
                                    updated_at,
                                },
                            ));
                        }
                    }
                    JournalRecord::Delete { txid, id } => {
                        if let Some(ops) = open.get_mut(&txid) {
                            ops.push((id, PendingWrite::Delete { cleared: false }));
                        }
                    }
                    JournalRecord::Commit { txid, sequence } => {
                        if let Some(ops) = open.remove(&txid) {
                            let mut discarded = CommitEvent::new(sequence);
                            for (id, write) in ops {
                                state.apply(id, write, &mut discarded);
                            }
                        }
                        state.last_sequence = state.last_sequence.max(sequence);
                    }
                }
            }
            (iter.torn_tail(), iter.valid_len())
        };

        if torn {
            let tail = journal.read_from(valid_len)?;
            if let Some(path) = torn_path {
                fs::write(path, &tail)?;
            }
            warn!(
                valid_len,
                tail_bytes = tail.len(),
                saved_to = ?torn_path,
                "discarding truncated journal tail"
            );
            journal.truncate(valid_len)?;
        }
        if !open.is_empty() {
            debug!(
                transactions = open.len(),
                "ignoring uncommitted journal transactions"
            );
        }

        state.next_txid = max_txid + 1;
        Ok(state)
    }

    /// Runs `f` with a mutation context on the designated thread and returns
    /// its result.
    ///
    /// Runs in place when the caller already is on the designated thread;
    /// otherwise the caller blocks until the designated thread has run `f`.
    /// Changes `f` leaves uncommitted are discarded.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine is closed or the designated
    /// thread aborted `f`, and otherwise whatever `f` returns.
    pub fn perform<R, F>(self: &Arc<Self>, f: F) -> CoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut MutationContext<'_>) -> CoreResult<R> + Send + 'static,
    {
        self.ensure_open()?;
        let engine = Arc::clone(self);
        self.executor.run(move || {
            let mut context = engine.context()?;
            f(&mut context)
        })?
    }

    /// Returns a mutation context for a caller already on the designated
    /// thread.
    ///
    /// # Errors
    ///
    /// Returns `WrongContext` off the designated thread and
    /// `BackendUnavailable` if the engine is closed.
    pub fn context(&self) -> CoreResult<MutationContext<'_>> {
        if !self.executor.is_current() {
            return Err(CoreError::WrongContext);
        }
        self.ensure_open()?;
        Ok(MutationContext::new(self))
    }

    /// Returns `true` on the designated thread.
    #[must_use]
    pub fn is_designated_thread(&self) -> bool {
        self.executor.is_current()
    }

    /// Journals, applies and announces one transaction.
    pub(crate) fn commit_writes(
        &self,
        writes: BTreeMap<RecordKey, PendingWrite>,
    ) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        let txid = TransactionId::new(state.next_txid);
        let sequence = state.last_sequence.next();

        let mut batch = Vec::with_capacity(writes.len() + 2);
        batch.push(JournalRecord::Begin { txid });
        for (id, write) in &writes {
            batch.push(match write {
                PendingWrite::Put {
                    payload,
                    updated_at,
                } => JournalRecord::Upsert {
                    txid,
                    id: id.clone(),
                    updated_at: *updated_at,
                    payload: payload.clone(),
                },
                PendingWrite::Delete { .. } => JournalRecord::Delete {
                    txid,
                    id: id.clone(),
                },
            });
        }
        batch.push(JournalRecord::Commit { txid, sequence });

        let size_before = self.journal.size()?;
        if let Err(e) = self.journal.append_batch(&batch) {
            // Cut a partial batch so later appends stay readable.
            if let Err(truncate_err) = self.journal.truncate(size_before) {
                warn!(error = %truncate_err, "failed to cut partial commit from journal");
            }
            return Err(e);
        }

        state.next_txid += 1;
        state.last_sequence = sequence;
        state.journal_entries += batch.len() as u64;

        let mut event = CommitEvent::new(sequence);
        for (id, write) in writes {
            state.apply(id, write, &mut event);
        }
        let needs_compaction = self.needs_compaction(&state);
        drop(state);

        self.feed.emit(event);

        if needs_compaction {
            if let Err(e) = self.compact() {
                warn!(error = %e, "automatic compaction failed");
            }
        }
        Ok(sequence)
    }

    fn needs_compaction(&self, state: &EngineState) -> bool {
        let threshold = self.config.compaction_threshold;
        if threshold == 0 || state.obsolete_entries() <= state.records.len() as u64 {
            return false;
        }
        self.journal.size().is_ok_and(|size| size > threshold)
    }

    /// Rewrites the journal as a single transaction holding the live records.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the rewrite fails.
    pub fn compact(&self) -> CoreResult<()> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        let bytes_before = self.journal.size()?;
        let txid = TransactionId::new(state.next_txid);

        let mut live: Vec<&Record> = state.records.values().collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));

        let mut snapshot = Vec::with_capacity(live.len() + 2);
        snapshot.push(JournalRecord::Begin { txid });
        snapshot.extend(live.into_iter().map(|record| JournalRecord::Upsert {
            txid,
            id: record.id.clone(),
            updated_at: record.updated_at,
            payload: record.payload.clone(),
        }));
        snapshot.push(JournalRecord::Commit {
            txid,
            sequence: state.last_sequence,
        });

        self.journal.rewrite(&snapshot)?;
        state.next_txid += 1;
        state.journal_entries = snapshot.len() as u64;

        info!(
            records = state.records.len(),
            bytes_before,
            bytes_after = self.journal.size()?,
            "journal compacted"
        );
        Ok(())
    }

    /// Returns the committed record for `id`.
    pub(crate) fn committed(&self, id: &RecordKey) -> Option<Record> {
        self.state.lock().records.get(id).cloned()
    }

    /// Returns the committed records of `collection`.
    pub(crate) fn committed_in(&self, collection: &str) -> Vec<Record> {
        self.state
            .lock()
            .records
            .values()
            .filter(|r| r.id.in_collection(collection))
            .cloned()
            .collect()
    }

    /// Returns live record counts per collection.
    #[must_use]
    pub fn collections(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for id in self.state.lock().records.keys() {
            *counts.entry(id.collection.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Reads every record currently in the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be read.
    pub fn journal_records(&self) -> CoreResult<Vec<(u64, JournalRecord)>> {
        // Keep commits out while reading.
        let _state = self.state.lock();
        self.journal.iter()?.collect()
    }

    /// Subscribes to commit events.
    pub fn subscribe(&self) -> (SubscriptionId, Receiver<Arc<CommitEvent>>) {
        self.feed.subscribe()
    }

    /// Drops a commit-event subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.feed.unsubscribe(id)
    }

    /// Returns up to `limit` recent commit events newer than `cursor`.
    #[must_use]
    pub fn changes_since(&self, cursor: SequenceNumber, limit: usize) -> Vec<Arc<CommitEvent>> {
        self.feed.poll(cursor, limit)
    }

    /// Returns the commit feed.
    #[must_use]
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        self.state.lock().last_sequence
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns a statistics snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal size cannot be read.
    pub fn stats(&self) -> CoreResult<EngineStats> {
        let state = self.state.lock();
        Ok(EngineStats {
            records: state.records.len(),
            journal_bytes: self.journal.size()?,
            journal_entries: state.journal_entries,
            last_sequence: state.last_sequence,
            subscribers: self.feed.subscriber_count(),
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the cache directory, if the engine is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(CacheDir::path)
    }

    /// Flushes the journal and stops the designated thread.
    ///
    /// Afterwards every operation fails with `BackendUnavailable`. Closing
    /// twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final journal sync fails.
    pub fn close(&self) -> CoreResult<()> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.executor.shutdown();
        let _state = self.state.lock();
        self.journal.sync()?;
        info!("cache engine closed");
        Ok(())
    }

    /// Checks if the engine is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::backend_unavailable("engine is closed"))
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path())
            .field("is_open", &self.is_open())
            .field("records", &self.record_count())
            .field("last_sequence", &self.last_sequence())
            .finish_non_exhaustive()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::ChangeType;
    use std::thread;
    use std::time::Duration;

    fn put(engine: &Arc<Engine>, collection: &'static str, key: &'static str, value: &'static [u8]) {
        engine
            .perform(move |ctx| {
                ctx.upsert(collection, key, value)?;
                ctx.commit()?;
                Ok(())
            })
            .unwrap();
    }

    fn get(engine: &Arc<Engine>, collection: &'static str, key: &'static str) -> Option<Record> {
        engine.perform(move |ctx| ctx.fetch_one(collection, key)).unwrap()
    }

    #[test]
    fn open_in_memory() {
        let engine = Engine::open_in_memory().unwrap();
        assert!(engine.is_open());
        assert_eq!(engine.record_count(), 0);
        assert_eq!(engine.last_sequence(), SequenceNumber::new(0));
    }

    #[test]
    fn upsert_commit_fetch() {
        let engine = Engine::open_in_memory().unwrap();
        put(&engine, "cache", "a", b"one");

        let record = get(&engine, "cache", "a").unwrap();
        assert_eq!(record.payload.as_ref(), b"one");
        assert_eq!(engine.last_sequence(), SequenceNumber::new(1));
        assert!(get(&engine, "other", "a").is_none());
    }

    #[test]
    fn upsert_never_duplicates() {
        let engine = Engine::open_in_memory().unwrap();
        put(&engine, "cache", "a", b"one");
        put(&engine, "cache", "a", b"two");

        let all = engine.perform(|ctx| ctx.fetch_all("cache")).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload.as_ref(), b"two");
    }

    #[test]
    fn staged_changes_are_visible_to_own_context_only() {
        let engine = Engine::open_in_memory().unwrap();
        let reader = Arc::clone(&engine);
        engine
            .perform(move |ctx| {
                ctx.upsert("cache", "a", b"staged".to_vec())?;
                assert!(ctx.fetch_one("cache", "a")?.is_some());
                assert!(reader.committed(&RecordKey::new("cache", "a")).is_none());
                Ok(())
            })
            .unwrap();

        // Dropped without commit.
        assert!(get(&engine, "cache", "a").is_none());
        assert_eq!(engine.last_sequence(), SequenceNumber::new(0));
    }

    #[test]
    fn commit_without_changes_is_noop() {
        let engine = Engine::open_in_memory().unwrap();
        let (_, events) = engine.subscribe();

        let sequence = engine.perform(|ctx| ctx.commit()).unwrap();
        assert!(sequence.is_none());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn rollback_discards_staged_changes() {
        let engine = Engine::open_in_memory().unwrap();
        let sequence = engine
            .perform(|ctx| {
                ctx.upsert("cache", "a", b"x".to_vec())?;
                assert!(ctx.has_changes());
                ctx.rollback();
                assert!(!ctx.has_changes());
                ctx.commit()
            })
            .unwrap();
        assert!(sequence.is_none());
    }

    #[test]
    fn delete_all_reports_removed_count() {
        let engine = Engine::open_in_memory().unwrap();
        put(&engine, "cache", "a", b"one");

        let removed = engine
            .perform(|ctx| {
                let n = ctx.delete_all("cache", "a")?;
                let again = ctx.delete_all("cache", "a")?;
                let missing = ctx.delete_all("cache", "missing")?;
                ctx.commit()?;
                Ok((n, again, missing))
            })
            .unwrap();
        assert_eq!(removed, (1, 0, 0));
        assert!(get(&engine, "cache", "a").is_none());
    }

    #[test]
    fn commit_event_classifies_changes() {
        let engine = Engine::open_in_memory().unwrap();
        put(&engine, "cache", "a", b"one");
        put(&engine, "cache", "b", b"one");
        let (_, events) = engine.subscribe();

        engine
            .perform(|ctx| {
                ctx.upsert("cache", "a", b"two".to_vec())?;
                ctx.upsert("cache", "c", b"new".to_vec())?;
                ctx.delete_all("cache", "b")?;
                ctx.commit()?;
                Ok(())
            })
            .unwrap();

        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event.sequence, SequenceNumber::new(3));
        assert_eq!(event.updated[0].key(), "a");
        assert_eq!(event.inserted[0].key(), "c");
        assert_eq!(event.deleted, vec![RecordKey::new("cache", "b")]);
    }

    #[test]
    fn clear_collection_reports_cleared_keys() {
        let engine = Engine::open_in_memory().unwrap();
        put(&engine, "cache", "a", b"1");
        put(&engine, "cache", "b", b"2");
        put(&engine, "other", "a", b"3");
        let (_, events) = engine.subscribe();

        let removed = engine
            .perform(|ctx| {
                let n = ctx.clear_collection("cache")?;
                ctx.commit()?;
                Ok(n)
            })
            .unwrap();

        assert_eq!(removed, 2);
        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        let changes: Vec<_> = event.changes().map(|(id, t)| (id.to_string(), t)).collect();
        assert_eq!(
            changes,
            vec![
                ("cache/a".to_string(), ChangeType::Clear),
                ("cache/b".to_string(), ChangeType::Clear)
            ]
        );
        assert_eq!(engine.collections().get("other"), Some(&1));
        assert_eq!(engine.collections().get("cache"), None);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let engine = Engine::open_in_memory().unwrap();
        let mut previous = None;
        for _ in 0..5 {
            let ts = engine
                .perform(|ctx| {
                    let ts = ctx.upsert("cache", "k", b"v".to_vec())?;
                    ctx.commit()?;
                    Ok(ts)
                })
                .unwrap();
            if let Some(previous) = previous {
                assert!(ts >= previous);
            }
            previous = Some(ts);
        }
    }

    #[test]
    fn perform_runs_on_designated_thread() {
        let config = Config::new().engine_thread_name("engine-under-test");
        let engine =
            Engine::open_with_backend(config, Box::new(MemoryJournal::new())).unwrap();

        assert!(!engine.is_designated_thread());
        let name = engine
            .perform(|ctx| {
                assert!(ctx.engine().is_designated_thread());
                Ok(thread::current().name().map(str::to_string))
            })
            .unwrap();
        assert_eq!(name.as_deref(), Some("engine-under-test"));
    }

    #[test]
    fn context_off_designated_thread_is_rejected() {
        let engine = Engine::open_in_memory().unwrap();
        assert!(matches!(engine.context(), Err(CoreError::WrongContext)));
    }

    #[test]
    fn nested_perform_runs_inline() {
        let engine = Engine::open_in_memory().unwrap();
        let inner = Arc::clone(&engine);
        engine
            .perform(move |_| {
                inner.perform(|ctx| {
                    ctx.upsert("cache", "nested", b"1".to_vec())?;
                    ctx.commit()?;
                    Ok(())
                })
            })
            .unwrap();
        assert!(get(&engine, "cache", "nested").is_some());
    }

    #[test]
    fn closed_engine_is_unavailable() {
        let engine = Engine::open_in_memory().unwrap();
        engine.close().unwrap();
        engine.close().unwrap();

        let err = engine.perform(|ctx| ctx.fetch_one("cache", "a")).unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn recovery_replays_committed_transactions() {
        let journal = MemoryJournal::new();
        let engine =
            Engine::open_with_backend(Config::default(), Box::new(journal.clone())).unwrap();
        put(&engine, "cache", "a", b"one");
        put(&engine, "cache", "b", b"two");
        engine
            .perform(|ctx| {
                ctx.delete_all("cache", "b")?;
                ctx.commit()?;
                Ok(())
            })
            .unwrap();
        engine.close().unwrap();

        let reopened = Engine::open_with_backend(
            Config::default(),
            Box::new(MemoryJournal::with_data(journal.data())),
        )
        .unwrap();
        assert_eq!(reopened.record_count(), 1);
        assert_eq!(reopened.last_sequence(), SequenceNumber::new(3));
        assert_eq!(
            get(&reopened, "cache", "a").unwrap().payload.as_ref(),
            b"one"
        );
    }

    #[test]
    fn uncommitted_transaction_is_ignored() {
        let txid = TransactionId::new(9);
        let mut data = Vec::new();
        for record in [
            JournalRecord::Begin { txid },
            JournalRecord::Delete {
                txid,
                id: RecordKey::new("cache", "a"),
            },
        ] {
            data.extend_from_slice(&record.encode().unwrap());
        }

        let engine = Engine::open_with_backend(
            Config::default(),
            Box::new(MemoryJournal::with_data(data)),
        )
        .unwrap();
        assert_eq!(engine.record_count(), 0);
        put(&engine, "cache", "a", b"after");
        assert!(get(&engine, "cache", "a").is_some());
    }

    #[test]
    fn torn_tail_is_truncated() {
        let journal = MemoryJournal::new();
        let engine =
            Engine::open_with_backend(Config::default(), Box::new(journal.clone())).unwrap();
        put(&engine, "cache", "a", b"one");
        engine.close().unwrap();

        let mut data = journal.data();
        let intact = data.len();
        data.extend_from_slice(&JOURNAL_PREFIX);
        let torn = MemoryJournal::with_data(data);

        let reopened =
            Engine::open_with_backend(Config::default(), Box::new(torn.clone())).unwrap();
        assert_eq!(reopened.record_count(), 1);
        assert_eq!(torn.data().len(), intact);
    }

    const JOURNAL_PREFIX: [u8; 6] = [b'C', b'J', b'N', b'L', 1, 0];

    #[test]
    fn checksum_mismatch_fails_open() {
        let journal = MemoryJournal::new();
        let engine =
            Engine::open_with_backend(Config::default(), Box::new(journal.clone())).unwrap();
        put(&engine, "cache", "a", b"one");
        engine.close().unwrap();

        let mut data = journal.data();
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let result =
            Engine::open_with_backend(Config::default(), Box::new(MemoryJournal::with_data(data)));
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn compaction_keeps_live_records() {
        let journal = MemoryJournal::new();
        let config = Config::new().compaction_threshold(0);
        let engine = Engine::open_with_backend(config, Box::new(journal.clone())).unwrap();
        for _ in 0..10 {
            put(&engine, "cache", "a", b"same");
        }
        put(&engine, "cache", "b", b"other");

        let before = engine.stats().unwrap();
        engine.compact().unwrap();
        let after = engine.stats().unwrap();

        assert!(after.journal_bytes < before.journal_bytes);
        assert_eq!(after.journal_entries, 4);
        assert_eq!(after.last_sequence, before.last_sequence);
        engine.close().unwrap();

        let reopened = Engine::open_with_backend(
            Config::default(),
            Box::new(MemoryJournal::with_data(journal.data())),
        )
        .unwrap();
        assert_eq!(reopened.record_count(), 2);
        assert_eq!(reopened.last_sequence(), SequenceNumber::new(11));
    }

    #[test]
    fn automatic_compaction_bounds_journal() {
        let config = Config::new().compaction_threshold(512);
        let engine =
            Engine::open_with_backend(config, Box::new(MemoryJournal::new())).unwrap();
        for _ in 0..100 {
            put(&engine, "cache", "hot", b"payload");
        }
        let stats = engine.stats().unwrap();
        assert!(stats.journal_bytes <= 1024, "journal grew to {}", stats.journal_bytes);
        assert_eq!(stats.records, 1);
    }

    #[test]
    fn changes_since_returns_recent_events() {
        let engine = Engine::open_in_memory().unwrap();
        put(&engine, "cache", "a", b"1");
        put(&engine, "cache", "b", b"2");

        let events = engine.changes_since(SequenceNumber::new(1), 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].inserted[0].key(), "b");
    }
}
