//! The engine's mutation context.

use crate::engine::Engine;
use crate::error::CoreResult;
use crate::record::{Record, RecordKey};
use crate::types::{SequenceNumber, Timestamp};
use bytes::Bytes;
use std::collections::BTreeMap;

/// A staged change to one record.
#[derive(Debug, Clone)]
pub(crate) enum PendingWrite {
    /// Insert or overwrite the record.
    Put {
        /// Codec-produced payload.
        payload: Bytes,
        /// Write time.
        updated_at: Timestamp,
    },
    /// Remove the record.
    Delete {
        /// Whether the delete came from a collection clear.
        cleared: bool,
    },
}

/// Staging area for reads and writes against the engine.
///
/// A context only exists on the engine's designated thread; see
/// [`Engine::perform`] and [`Engine::context`]. Staged changes are visible to
/// this context's own reads and become durable and visible to everyone else
/// on [`MutationContext::commit`]. Changes still staged when the context is
/// dropped are discarded.
pub struct MutationContext<'a> {
    engine: &'a Engine,
    pending: BTreeMap<RecordKey, PendingWrite>,
}

impl<'a> MutationContext<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            pending: BTreeMap::new(),
        }
    }

    /// Returns the engine this context writes to.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        self.engine
    }

    /// Fetches the record stored under `key` in `collection`.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine has been closed.
    pub fn fetch_one(&self, collection: &str, key: &str) -> CoreResult<Option<Record>> {
        self.engine.ensure_open()?;
        let id = RecordKey::new(collection, key);
        Ok(self.lookup(&id))
    }

    /// Fetches every record in `collection`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine has been closed.
    pub fn fetch_all(&self, collection: &str) -> CoreResult<Vec<Record>> {
        self.engine.ensure_open()?;

        let mut records: BTreeMap<String, Record> = self
            .engine
            .committed_in(collection)
            .into_iter()
            .map(|r| (r.id.key.clone(), r))
            .collect();

        for (id, write) in &self.pending {
            if !id.in_collection(collection) {
                continue;
            }
            match write {
                PendingWrite::Put {
                    payload,
                    updated_at,
                } => {
                    records.insert(
                        id.key.clone(),
                        Record::new(id.clone(), payload.clone(), *updated_at),
                    );
                }
                PendingWrite::Delete { .. } => {
                    records.remove(&id.key);
                }
            }
        }

        Ok(records.into_values().collect())
    }

    /// Stages an insert or overwrite of `key` in `collection`.
    ///
    /// The new `updated_at` is the current time, or the record's previous
    /// `updated_at` if the clock reads earlier. Returns the timestamp.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine has been closed.
    pub fn upsert(
        &mut self,
        collection: &str,
        key: &str,
        payload: impl Into<Bytes>,
    ) -> CoreResult<Timestamp> {
        self.engine.ensure_open()?;
        let id = RecordKey::new(collection, key);

        let now = Timestamp::now();
        let updated_at = match self.lookup(&id) {
            Some(previous) => now.max(previous.updated_at),
            None => now,
        };

        self.pending.insert(
            id,
            PendingWrite::Put {
                payload: payload.into(),
                updated_at,
            },
        );
        Ok(updated_at)
    }

    /// Stages the deletion of every record matching `key` in `collection`.
    ///
    /// Returns the number of records that will be removed (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine has been closed.
    pub fn delete_all(&mut self, collection: &str, key: &str) -> CoreResult<usize> {
        self.engine.ensure_open()?;
        let id = RecordKey::new(collection, key);

        if self.lookup(&id).is_none() {
            return Ok(0);
        }
        if self.engine.committed(&id).is_some() {
            self.pending
                .insert(id, PendingWrite::Delete { cleared: false });
        } else {
            // Only staged so far.
            self.pending.remove(&id);
        }
        Ok(1)
    }

    /// Stages the removal of every record in `collection`.
    ///
    /// Removed keys are reported as cleared, not deleted, in the commit event.
    /// Returns the number of records that will be removed.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the engine has been closed.
    pub fn clear_collection(&mut self, collection: &str) -> CoreResult<usize> {
        let records = self.fetch_all(collection)?;
        self.pending.retain(|id, _| !id.in_collection(collection));

        let removed = records.len();
        for record in records {
            if self.engine.committed(&record.id).is_some() {
                self.pending
                    .insert(record.id, PendingWrite::Delete { cleared: true });
            }
        }
        Ok(removed)
    }

    /// Returns `true` if changes are staged.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Discards every staged change.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    /// Commits the staged changes as one transaction.
    ///
    /// Returns the commit's sequence number, or `None` without writing or
    /// emitting anything when nothing is staged. On error the staged changes
    /// are discarded and nothing becomes visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the journal write fails.
    pub fn commit(&mut self) -> CoreResult<Option<SequenceNumber>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let writes = std::mem::take(&mut self.pending);
        self.engine.commit_writes(writes).map(Some)
    }

    fn lookup(&self, id: &RecordKey) -> Option<Record> {
        match self.pending.get(id) {
            Some(PendingWrite::Put {
                payload,
                updated_at,
            }) => Some(Record::new(id.clone(), payload.clone(), *updated_at)),
            Some(PendingWrite::Delete { .. }) => None,
            None => self.engine.committed(id),
        }
    }
}

impl std::fmt::Debug for MutationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationContext")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
