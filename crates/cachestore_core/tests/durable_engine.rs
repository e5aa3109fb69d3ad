//! Durable store and engine behavior across threads, writers and restarts.

use cachestore_core::{
    CacheDir, CborCodec, Codec, Config, CoreError, DurableStore, Engine, JsonCodec, Store,
    StoreConfig, StoreFactory,
};
use cachestore_storage::{JournalBackend, MemoryJournal, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn cross_writer_commit_notifies_observer() {
    let engine = Engine::open_in_memory().unwrap();
    let writer = StoreFactory::cache_store_with(Arc::clone(&engine), StoreConfig::default()).unwrap();
    let reader = StoreFactory::cache_store_with(engine, StoreConfig::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    reader.start_observing_updates("count", move || {
        let _ = tx.send(());
    });

    writer.save(&42u32, "count").unwrap();

    rx.recv_timeout(WAIT).unwrap();
    assert_eq!(reader.data::<u32>("count").unwrap(), Some(42));
}

#[test]
fn sync_component_writing_through_perform_notifies_observer() {
    let store = StoreFactory::cache_store_in_memory().unwrap();
    let (tx, rx) = mpsc::channel();
    store.start_observing_updates("remote", move || {
        let _ = tx.send(());
    });

    // A writer that bypasses the store and talks to the engine directly.
    let engine = Arc::clone(store.engine());
    thread::spawn(move || {
        engine
            .perform(|ctx| {
                let payload = CborCodec::new().encode("from sync").unwrap();
                ctx.upsert("cache", "remote", payload)?;
                ctx.commit()?;
                Ok(())
            })
            .unwrap();
    })
    .join()
    .unwrap();

    rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        store.data::<String>("remote").unwrap().as_deref(),
        Some("from sync")
    );
}

#[test]
fn fifty_concurrent_savers() {
    let store = Arc::new(StoreFactory::cache_store_in_memory().unwrap());

    let handles: Vec<_> = (0..50u32)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.save(&i, &format!("key-{i}")))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    for i in 0..50u32 {
        assert_eq!(store.data::<u32>(&format!("key-{i}")).unwrap(), Some(i));
    }
    assert_eq!(store.keys().unwrap().len(), 50);
    assert_eq!(store.engine().last_sequence().as_u64(), 50);
}

#[test]
fn values_survive_reopen() {
    let dir = tempdir().unwrap();

    {
        let store = StoreFactory::cache_store(dir.path()).unwrap();
        store.save("persisted", "a").unwrap();
        store.save(&7u64, "b").unwrap();
        store.delete_data("b").unwrap();
        store.engine().close().unwrap();
    }

    let store = StoreFactory::cache_store(dir.path()).unwrap();
    assert_eq!(
        store.data::<String>("a").unwrap().as_deref(),
        Some("persisted")
    );
    assert_eq!(store.data::<u64>("b").unwrap(), None);
    assert!(store.last_updated_at("a").unwrap().is_some());
}

#[test]
fn torn_tail_is_discarded_on_reopen() {
    let dir = tempdir().unwrap();

    {
        let store = StoreFactory::cache_store(dir.path()).unwrap();
        store.save("kept", "a").unwrap();
    }

    let journal = dir.path().join("journal.log");
    let intact = std::fs::metadata(&journal).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&journal).unwrap();
        file.write_all(b"CJNL\x01\x00\x02\x40\x00").unwrap();
    }

    let store = StoreFactory::cache_store(dir.path()).unwrap();
    assert_eq!(store.data::<String>("a").unwrap().as_deref(), Some("kept"));
    assert_eq!(std::fs::metadata(&journal).unwrap().len(), intact);
    assert_eq!(
        std::fs::read(dir.path().join(CacheDir::TORN_FILE)).unwrap(),
        b"CJNL\x01\x00\x02\x40\x00"
    );

    store.save("appended", "b").unwrap();
    drop(store);

    let store = StoreFactory::cache_store(dir.path()).unwrap();
    assert_eq!(
        store.data::<String>("b").unwrap().as_deref(),
        Some("appended")
    );
}

#[test]
fn corrupted_length_fails_open_and_keeps_journal() {
    let dir = tempdir().unwrap();

    {
        let store = StoreFactory::cache_store(dir.path()).unwrap();
        store.save("one", "a").unwrap();
        store.save("two", "b").unwrap();
    }

    let journal = dir.path().join("journal.log");
    let mut bytes = std::fs::read(&journal).unwrap();
    let intact = bytes.clone();

    // High byte of the first record's length field.
    bytes[10] = 0x7f;
    std::fs::write(&journal, &bytes).unwrap();
    let err = Engine::open(dir.path(), Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::JournalCorruption { .. }));
    assert_eq!(std::fs::read(&journal).unwrap(), bytes);

    // A smaller overrun still lands on the records that follow.
    bytes[7..11].copy_from_slice(&(intact.len() as u32).to_le_bytes());
    std::fs::write(&journal, &bytes).unwrap();
    let err = Engine::open(dir.path(), Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::JournalCorruption { .. }));
    assert_eq!(std::fs::read(&journal).unwrap(), bytes);
    assert!(!dir.path().join(CacheDir::TORN_FILE).exists());

    std::fs::write(&journal, &intact).unwrap();
    let store = StoreFactory::cache_store(dir.path()).unwrap();
    assert_eq!(store.data::<String>("a").unwrap().as_deref(), Some("one"));
    assert_eq!(store.data::<String>("b").unwrap().as_deref(), Some("two"));
}

#[test]
fn corrupted_journal_fails_open() {
    let dir = tempdir().unwrap();

    {
        let store = StoreFactory::cache_store(dir.path()).unwrap();
        store.save("value", "a").unwrap();
    }

    let journal = dir.path().join("journal.log");
    let mut bytes = std::fs::read(&journal).unwrap();
    bytes[20] ^= 0x55;
    std::fs::write(&journal, bytes).unwrap();

    let err = Engine::open(dir.path(), Config::default()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ChecksumMismatch { .. } | CoreError::JournalCorruption { .. }
    ));
}

#[test]
fn second_engine_on_same_directory_is_locked() {
    let dir = tempdir().unwrap();
    let _engine = Engine::open(dir.path(), Config::default()).unwrap();

    let err = Engine::open(dir.path(), Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::CacheLocked));
}

#[test]
fn missing_directory_without_create_fails() {
    let dir = tempdir().unwrap();
    let config = Config::new().create_if_missing(false);

    let err = Engine::open(&dir.path().join("absent"), config).unwrap_err();
    assert!(matches!(err, CoreError::InvalidFormat { .. }));
}

#[test]
fn compaction_shrinks_journal_and_keeps_values() {
    let dir = tempdir().unwrap();
    let config = Config::new().compaction_threshold(0);

    {
        let engine = Engine::open(dir.path(), config.clone()).unwrap();
        let store = DurableStore::new(Arc::clone(&engine)).unwrap();
        for i in 0..100u32 {
            store.save(&i, "counter").unwrap();
        }
        store.save("other", "name").unwrap();

        let before = engine.stats().unwrap().journal_bytes;
        engine.compact().unwrap();
        let after = engine.stats().unwrap().journal_bytes;
        assert!(after < before / 10, "{after} !< {before} / 10");
    }

    let engine = Engine::open(dir.path(), config).unwrap();
    let store = DurableStore::new(engine).unwrap();
    assert_eq!(store.data::<u32>("counter").unwrap(), Some(99));
    assert_eq!(store.data::<String>("name").unwrap().as_deref(), Some("other"));
}

#[test]
fn stores_with_different_codecs_share_engine() {
    let engine = Engine::open_in_memory().unwrap();
    let cbor = DurableStore::open(
        Arc::clone(&engine),
        CborCodec::new(),
        StoreConfig::new().collection("binary"),
    )
    .unwrap();
    let json = DurableStore::open(
        Arc::clone(&engine),
        JsonCodec::new(),
        StoreConfig::new().collection("text"),
    )
    .unwrap();

    cbor.save(&vec![1u8, 2, 3], "k").unwrap();
    json.save(&vec![4u8, 5], "k").unwrap();

    assert_eq!(cbor.data::<Vec<u8>>("k").unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(json.data::<Vec<u8>>("k").unwrap(), Some(vec![4, 5]));
    assert_eq!(engine.collections().len(), 2);
}

#[test]
fn observer_may_read_store_from_callback() {
    let store = Arc::new(StoreFactory::cache_store_in_memory().unwrap());
    let (tx, rx) = mpsc::channel();

    let reader = Arc::downgrade(&store);
    store.start_observing_updates("k", move || {
        if let Some(store) = reader.upgrade() {
            let _ = tx.send(store.data::<u32>("k").unwrap());
        }
    });

    store.save(&9u32, "k").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some(9));
}

#[test]
fn closed_engine_reports_backend_unavailable() {
    let store = StoreFactory::cache_store_in_memory().unwrap();
    store.engine().close().unwrap();

    let err = store.save(&1u8, "k").unwrap_err();
    assert!(err.is_backend_unavailable());
    assert!(store.clear().unwrap_err().is_backend_unavailable());
}

/// Memory journal whose appends fail while `failing` is set.
#[derive(Debug)]
struct FlakyJournal {
    inner: MemoryJournal,
    failing: Arc<AtomicBool>,
}

impl JournalBackend for FlakyJournal {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::other("disk full")));
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.inner.replace(data)
    }
}

#[test]
fn failed_commit_reaches_caller_and_changes_nothing() {
    let failing = Arc::new(AtomicBool::new(false));
    let backend = FlakyJournal {
        inner: MemoryJournal::new(),
        failing: Arc::clone(&failing),
    };
    let engine = Engine::open_with_backend(Config::default(), Box::new(backend)).unwrap();
    let store = DurableStore::new(Arc::clone(&engine)).unwrap();

    let (tx, rx) = mpsc::channel();
    store.start_observing_updates("k", move || {
        let _ = tx.send(());
    });

    store.save(&1u32, "k").unwrap();
    rx.recv_timeout(WAIT).unwrap();
    let sequence = engine.last_sequence();
    let journal_bytes = engine.stats().unwrap().journal_bytes;

    failing.store(true, Ordering::SeqCst);
    let err = store.save(&2u32, "k").unwrap_err();
    assert!(matches!(err, CoreError::Storage(StorageError::Io(_))), "{err:?}");
    assert!(err.to_string().contains("disk full"));

    assert_eq!(store.data::<u32>("k").unwrap(), Some(1));
    assert_eq!(engine.last_sequence(), sequence);
    assert_eq!(engine.stats().unwrap().journal_bytes, journal_bytes);
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    failing.store(false, Ordering::SeqCst);
    store.save(&3u32, "k").unwrap();
    rx.recv_timeout(WAIT).unwrap();
    assert_eq!(store.data::<u32>("k").unwrap(), Some(3));
}

#[test]
fn unencodable_value_is_encoding_error() {
    let engine = Engine::open_in_memory().unwrap();
    let store =
        DurableStore::open(Arc::clone(&engine), JsonCodec::new(), StoreConfig::default()).unwrap();
    store.save(&7u32, "bad").unwrap();
    let sequence = engine.last_sequence();

    // JSON object keys must be strings.
    let mut value = BTreeMap::new();
    value.insert(vec![1u8, 2], 3u32);

    let err = store.save(&value, "bad").unwrap_err();
    assert!(matches!(&err, CoreError::Encoding { key, .. } if key == "bad"), "{err:?}");
    assert_eq!(store.data::<u32>("bad").unwrap(), Some(7));
    assert_eq!(engine.last_sequence(), sequence);
}
