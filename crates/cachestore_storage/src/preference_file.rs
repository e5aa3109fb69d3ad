//! File-backed preference map.
//!
//! The whole map is written as one snapshot:
//!
//! ```text
//! | magic "CPRF" (4) | version u16 | count u32 |
//! | key_len u32 | key | value_len u32 | value |  (count times)
//! | crc32 u32 |
//! ```
//!
//! Snapshots are written to a sibling `*.tmp` file and renamed into place.

use crate::error::{StorageError, StorageResult};
use crate::preferences::PreferenceBackend;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const MAGIC: [u8; 4] = *b"CPRF";
const VERSION: u16 = 1;

/// A preference map persisted to a single file.
///
/// Every mutation rewrites the file eagerly. A failed write does not fail the
/// mutation: it is logged, the map stays dirty, and the next
/// [`PreferenceBackend::flush`] retries and reports the error.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    write_lock: Mutex<()>,
    /// Bumped under the `entries` write lock on every mutation.
    generation: AtomicU64,
    /// Highest generation known to be on disk.
    persisted: AtomicU64,
}

impl FilePreferences {
    /// Opens the map stored at `path`, starting empty if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the file fails validation, or an
    /// I/O error.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let entries = match fs::read(path) {
            Ok(bytes) => decode_snapshot(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_dirty(&self) -> bool {
        self.generation.load(Ordering::Acquire) > self.persisted.load(Ordering::Acquire)
    }

    fn mark_persisted(&self, generation: u64) {
        self.persisted.fetch_max(generation, Ordering::AcqRel);
    }

    fn persist(&self) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        let (generation, snapshot) = {
            let entries = self.entries.read();
            (self.generation.load(Ordering::Acquire), encode_snapshot(&entries)?)
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        let temp = self.path.with_file_name(name);
        {
            let mut file = File::create(&temp)?;
            file.write_all(&snapshot)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        self.mark_persisted(generation);
        Ok(())
    }

    fn persist_after_mutation(&self) {
        if let Err(error) = self.persist() {
            tracing::warn!(path = %self.path.display(), %error, "failed to persist preferences");
        }
    }
}

impl PreferenceBackend for FilePreferences {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) {
        {
            let mut entries = self.entries.write();
            entries.insert(key.to_string(), value.to_vec());
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.persist_after_mutation();
    }

    fn remove(&self, key: &str) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            let removed = entries.remove(key).is_some();
            if removed {
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
            removed
        };
        if removed {
            self.persist_after_mutation();
        }
        removed
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn clear(&self) -> Vec<String> {
        let removed = {
            let mut entries = self.entries.write();
            self.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::take(&mut *entries)
        };
        self.persist_after_mutation();
        removed.into_keys().collect()
    }

    fn flush(&self) -> StorageResult<()> {
        if self.is_dirty() {
            self.persist()?;
        }
        Ok(())
    }
}

fn encode_snapshot(entries: &BTreeMap<String, Vec<u8>>) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    put_u32_len(&mut buf, entries.len(), "preference count")?;
    for (key, value) in entries {
        put_u32_len(&mut buf, key.len(), "preference key")?;
        buf.extend_from_slice(key.as_bytes());
        put_u32_len(&mut buf, value.len(), "preference value")?;
        buf.extend_from_slice(value);
    }
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

fn put_u32_len(buf: &mut Vec<u8>, len: usize, what: &str) -> StorageResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| StorageError::invalid_input(format!("{what} exceeds 4 GiB")))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn decode_snapshot(bytes: &[u8]) -> StorageResult<BTreeMap<String, Vec<u8>>> {
    if bytes.len() < 14 {
        return Err(StorageError::Corrupted("preference file too short".into()));
    }
    let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(StorageError::Corrupted(format!(
            "preference checksum mismatch: expected {stored:08x}, got {computed:08x}"
        )));
    }
    if body[0..4] != MAGIC {
        return Err(StorageError::Corrupted("bad preference magic".into()));
    }
    let version = u16::from_le_bytes([body[4], body[5]]);
    if version != VERSION {
        return Err(StorageError::Corrupted(format!(
            "unsupported preference version {version}"
        )));
    }

    let mut cursor = 6;
    let count = read_u32(body, &mut cursor)?;
    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let key = read_chunk(body, &mut cursor)?;
        let key = String::from_utf8(key.to_vec())
            .map_err(|_| StorageError::Corrupted("preference key is not UTF-8".into()))?;
        let value = read_chunk(body, &mut cursor)?.to_vec();
        entries.insert(key, value);
    }
    if cursor != body.len() {
        return Err(StorageError::Corrupted("trailing bytes in preference file".into()));
    }
    Ok(entries)
}

fn read_u32(body: &[u8], cursor: &mut usize) -> StorageResult<u32> {
    let end = *cursor + 4;
    let bytes = body
        .get(*cursor..end)
        .ok_or_else(|| StorageError::Corrupted("unexpected end of preference file".into()))?;
    *cursor = end;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_chunk<'a>(body: &'a [u8], cursor: &mut usize) -> StorageResult<&'a [u8]> {
    let len = read_u32(body, cursor)? as usize;
    let end = cursor.saturating_add(len);
    let chunk = body
        .get(*cursor..end)
        .ok_or_else(|| StorageError::Corrupted("unexpected end of preference file".into()))?;
    *cursor = end;
    Ok(chunk)
}
