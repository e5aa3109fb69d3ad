//! Persisted cache records.

use crate::types::Timestamp;
use bytes::Bytes;
use std::fmt;

/// Identity of a record: a key inside a collection.
///
/// A collection is the record type a store tracks. At most one live record
/// exists per `(collection, key)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Collection the record belongs to.
    pub collection: String,
    /// Cache key, unique within the collection.
    pub key: String,
}

impl RecordKey {
    /// Creates a record key.
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Returns `true` if this key belongs to `collection`.
    #[must_use]
    pub fn in_collection(&self, collection: &str) -> bool {
        self.collection == collection
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// A persisted `(key, payload, updated_at)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record identity.
    pub id: RecordKey,
    /// Codec-produced payload; opaque to the engine.
    pub payload: Bytes,
    /// Time of the last write.
    pub updated_at: Timestamp,
}

impl Record {
    /// Creates a record.
    pub fn new(id: RecordKey, payload: impl Into<Bytes>, updated_at: Timestamp) -> Self {
        Self {
            id,
            payload: payload.into(),
            updated_at,
        }
    }

    /// Returns the cache key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.id.key
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.id.collection
    }
}
