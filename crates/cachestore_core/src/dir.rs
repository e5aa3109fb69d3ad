//! Cache directory management.
//!
//! A durable cache lives in one directory:
//!
//! ```text
//! <cache_path>/
//! ├─ LOCK               # Advisory lock held by the open engine
//! ├─ journal.log        # Append-only commit journal
//! └─ journal.log.torn   # Last torn tail cut off during recovery, if any
//! ```
//!
//! The LOCK file keeps a second process from opening the same cache and
//! interleaving appends into its journal.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// An open cache directory holding the exclusive lock.
#[derive(Debug)]
pub struct CacheDir {
    path: PathBuf,
    _lock_file: File,
}

impl CacheDir {
    /// Name of the lock file.
    pub const LOCK_FILE: &'static str = "LOCK";

    /// Name of the journal file.
    pub const JOURNAL_FILE: &'static str = "journal.log";

    /// Name of the file holding the last torn journal tail cut off on open.
    pub const TORN_FILE: &'static str = "journal.log.torn";

    /// Opens or creates a cache directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (`CacheLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "cache directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(Self::LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::CacheLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the cache directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the journal file.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(Self::JOURNAL_FILE)
    }

    /// Returns the path a discarded torn tail is copied to.
    #[must_use]
    pub fn torn_path(&self) -> PathBuf {
        self.path.join(Self::TORN_FILE)
    }
}
