//! Error types for cachestore core.

use cachestore_codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in cachestore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The persistence context could not be obtained.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable {
        /// Why the context could not be obtained.
        reason: String,
    },

    /// The codec rejected a value being saved.
    #[error("failed to encode value for key {key:?}: {source}")]
    Encoding {
        /// Key being written.
        key: String,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// The codec rejected a stored payload.
    #[error("failed to decode value for key {key:?}: {source}")]
    Decoding {
        /// Key being read.
        key: String,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] cachestore_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal is corrupted or invalid.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in the journal.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// A mutation context was requested off the designated thread.
    #[error("mutation context requested off the designated thread")]
    WrongContext,

    /// Another process holds the cache directory.
    #[error("cache locked: another process has exclusive access")]
    CacheLocked,

    /// Invalid cache directory or journal format.
    #[error("invalid cache format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a backend unavailable error.
    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an encoding error for `key`.
    pub fn encoding(key: impl Into<String>, source: CodecError) -> Self {
        Self::Encoding {
            key: key.into(),
            source,
        }
    }

    /// Creates a decoding error for `key`.
    pub fn decoding(key: impl Into<String>, source: CodecError) -> Self {
        Self::Decoding {
            key: key.into(),
            source,
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` for [`CoreError::BackendUnavailable`].
    #[must_use]
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}
