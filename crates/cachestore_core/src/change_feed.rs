//! Commit-event feed.
//!
//! The engine emits one [`CommitEvent`] per successful commit, carrying every
//! record the commit inserted, updated, deleted or cleared, whichever writer
//! produced it. Stores subscribe to the feed and filter it down to their own
//! collection and observed keys.
//!
//! # Usage
//!
//! ```rust,ignore
//! let (_id, events) = engine.feed().subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = events.recv() {
//!         for (id, change) in event.changes() {
//!             println!("{id}: {change:?}");
//!         }
//!     }
//! });
//! ```

use crate::record::{Record, RecordKey};
use crate::types::SequenceNumber;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Kind of change a commit made to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Record was created.
    Insert,
    /// Existing record was overwritten.
    Update,
    /// Record was deleted by key.
    Delete,
    /// Record was removed by a bulk clear of its collection.
    Clear,
}

/// Changes made by one committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    /// Sequence number of the commit.
    pub sequence: SequenceNumber,
    /// Records created by the commit.
    pub inserted: Vec<Record>,
    /// Records overwritten by the commit, with their new contents.
    pub updated: Vec<Record>,
    /// Records deleted by key.
    pub deleted: Vec<RecordKey>,
    /// Records removed by a collection clear.
    pub cleared: Vec<RecordKey>,
}

impl CommitEvent {
    /// Creates an event with no changes.
    #[must_use]
    pub fn new(sequence: SequenceNumber) -> Self {
        Self {
            sequence,
            inserted: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            cleared: Vec::new(),
        }
    }

    /// Iterates over every changed record.
    pub fn changes(&self) -> impl Iterator<Item = (&RecordKey, ChangeType)> + '_ {
        let inserted = self.inserted.iter().map(|r| (&r.id, ChangeType::Insert));
        let updated = self.updated.iter().map(|r| (&r.id, ChangeType::Update));
        let deleted = self.deleted.iter().map(|id| (id, ChangeType::Delete));
        let cleared = self.cleared.iter().map(|id| (id, ChangeType::Clear));
        inserted.chain(updated).chain(deleted).chain(cleared)
    }

    /// Iterates over the changed records of one collection.
    pub fn changes_in<'a>(
        &'a self,
        collection: &'a str,
    ) -> impl Iterator<Item = (&'a RecordKey, ChangeType)> + 'a {
        self.changes().filter(move |(id, _)| id.in_collection(collection))
    }

    /// Number of changed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len() + self.cleared.len()
    }

    /// Returns `true` if the commit changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle identifying one feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Distributes commit events to subscribers.
///
/// The feed:
/// - Emits only committed changes
/// - Preserves commit order
/// - Supports multiple subscribers
/// - Keeps a bounded history for cursor-based catch-up
pub struct ChangeFeed {
    subscribers: RwLock<Vec<(SubscriptionId, Sender<Arc<CommitEvent>>)>>,
    history: RwLock<VecDeque<Arc<CommitEvent>>>,
    max_history: usize,
    next_id: AtomicU64,
}

impl ChangeFeed {
    /// Creates a feed with the default history limit.
    pub fn new() -> Self {
        Self::with_max_history(1024)
    }

    /// Creates a feed that keeps at most `max_history` events.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribes to future commit events.
    ///
    /// The receiver should be drained continuously; undelivered events stay
    /// queued in the channel.
    pub fn subscribe(&self) -> (SubscriptionId, Receiver<Arc<CommitEvent>>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push((id, tx));
        (id, rx)
    }

    /// Drops a subscription. Its receiver disconnects.
    ///
    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Emits an event to every subscriber.
    ///
    /// Called by the engine after a commit is durable. Subscribers whose
    /// receiver was dropped are removed.
    pub fn emit(&self, event: CommitEvent) -> Arc<CommitEvent> {
        let event = Arc::new(event);

        {
            let mut history = self.history.write();
            history.push_back(Arc::clone(&event));
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|(_, tx)| tx.send(Arc::clone(&event)).is_ok());
        event
    }

    /// Returns up to `limit` events with a sequence greater than `cursor`.
    pub fn poll(&self, cursor: SequenceNumber, limit: usize) -> Vec<Arc<CommitEvent>> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the newest sequence in history, if any.
    pub fn latest_sequence(&self) -> Option<SequenceNumber> {
        self.history.read().back().map(|e| e.sequence)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
