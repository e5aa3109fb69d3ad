//! # cachestore storage
//!
//! Byte-level backends for cachestore.
//!
//! Two kinds of backend live here, and neither interprets the bytes it holds:
//!
//! - [`JournalBackend`] is an append-only byte log. The durable engine writes
//!   its checksummed journal through it and replays it on open.
//! - [`PreferenceBackend`] is a flat key → bytes map, the storage behind the
//!   ephemeral store.
//!
//! ## Available Backends
//!
//! - [`MemoryJournal`] / [`FileJournal`]
//! - [`MemoryPreferences`] / [`FilePreferences`]
//!
//! ## Example
//!
//! ```rust
//! use cachestore_storage::{JournalBackend, MemoryJournal};
//!
//! let mut journal = MemoryJournal::new();
//! let offset = journal.append(b"commit").unwrap();
//! assert_eq!(journal.read_at(offset, 6).unwrap(), b"commit");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod journal;
mod memory;
mod preference_file;
mod preferences;

pub use error::{StorageError, StorageResult};
pub use file::FileJournal;
pub use journal::JournalBackend;
pub use memory::MemoryJournal;
pub use preference_file::FilePreferences;
pub use preferences::{MemoryPreferences, PreferenceBackend};
