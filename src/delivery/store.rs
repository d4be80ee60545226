//! Per-recipient queues of parts that are waiting for a "continue" request.
//!
//! The store sits behind [`GenericPendingStore`] so the in-memory map can later be
//! swapped for a process-external store without touching the session controller.

use std::{
    collections::VecDeque,
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, instrument, warn};

use crate::base::types::{MessagePart, Recipient};

// Types.

/// Identifies one queue installation; a newer session for the same recipient gets a
/// larger id.
pub type SessionId = u64;

/// A part taken off the front of a recipient's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedPart {
    pub part: MessagePart,
    /// Parts still queued after this one.
    pub remaining: usize,
    /// The session the part belongs to; needed to restore it.
    pub session: SessionId,
}

// Traits.

/// Generic pending-part store that implementations must provide.
///
/// Every operation is atomic with respect to a single recipient: concurrent pops for the
/// same recipient observe a serial order, and operations on different recipients do not
/// wait on each other. An entry exists only while it holds at least one part.
#[async_trait]
pub trait GenericPendingStore: Send + Sync + 'static {
    /// Installs `parts` as the recipient's queue, replacing any existing one.
    ///
    /// An empty `parts` clears the recipient instead, since empty queues are never stored.
    async fn create_or_replace(&self, recipient: &Recipient, parts: Vec<MessagePart>) -> SessionId;

    /// Removes the first queued part, deleting the entry once it is drained.
    async fn pop_next(&self, recipient: &Recipient) -> Option<PoppedPart>;

    /// Puts an undelivered part back at the front of its session's queue.
    ///
    /// Returns `false` (and drops the part) when a newer session owns the recipient, even
    /// if that session left no queue behind.
    async fn restore(&self, recipient: &Recipient, session: SessionId, part: MessagePart) -> bool;

    /// Whether the recipient has any pending part.
    async fn has(&self, recipient: &Recipient) -> bool;

    /// Number of pending parts for the recipient.
    async fn remaining(&self, recipient: &Recipient) -> usize;

    /// Drops the recipient's queue and retires its session; returns whether a queue existed.
    async fn clear(&self, recipient: &Recipient) -> bool;
}

// Structs.

/// Pending store handle for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct PendingStore {
    inner: Arc<dyn GenericPendingStore>,
}

impl Deref for PendingStore {
    type Target = dyn GenericPendingStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl PendingStore {
    pub fn new(inner: Arc<dyn GenericPendingStore>) -> Self {
        Self { inner }
    }

    /// Creates a store backed by process memory.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryPendingStore::default()))
    }
}

/// A recipient's queue and the session that installed it.
#[derive(Debug)]
struct PendingQueue {
    session: SessionId,
    parts: VecDeque<MessagePart>,
}

/// In-memory store over sharded maps.
///
/// Each shard is locked only for the duration of one map operation, never across an
/// await point, so a slow transport never holds a recipient's lock. When both maps are
/// locked, `latest` is always taken before `queues`.
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    queues: DashMap<Recipient, PendingQueue>,
    /// The last session installed per recipient; outlives its drained queue.
    latest: DashMap<Recipient, SessionId>,
    next_session: AtomicU64,
}

impl MemoryPendingStore {
    fn next_session_id(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl GenericPendingStore for MemoryPendingStore {
    #[instrument(skip(self, parts), fields(parts = parts.len()))]
    async fn create_or_replace(&self, recipient: &Recipient, parts: Vec<MessagePart>) -> SessionId {
        let session = self.next_session_id();

        let mut latest = self.latest.entry(recipient.clone()).or_insert(session);
        *latest = session;

        if parts.is_empty() {
            self.queues.remove(recipient);
            return session;
        }

        let replaced = self.queues.insert(
            recipient.clone(),
            PendingQueue {
                session,
                parts: parts.into(),
            },
        );

        if let Some(old) = replaced {
            debug!(old_session = old.session, dropped = old.parts.len(), "Replaced a pending queue.");
        }

        session
    }

    async fn pop_next(&self, recipient: &Recipient) -> Option<PoppedPart> {
        let Entry::Occupied(mut entry) = self.queues.entry(recipient.clone()) else {
            return None;
        };

        let queue = entry.get_mut();
        let session = queue.session;
        let part = queue.parts.pop_front();
        let remaining = queue.parts.len();

        if remaining == 0 {
            entry.remove();
        }

        part.map(|part| PoppedPart { part, remaining, session })
    }

    #[instrument(skip(self, part), fields(index = part.index))]
    async fn restore(&self, recipient: &Recipient, session: SessionId, part: MessagePart) -> bool {
        let latest = self.latest.get(recipient);
        let is_latest = latest.as_ref().is_some_and(|current| **current == session);

        match self.queues.entry(recipient.clone()) {
            Entry::Occupied(mut entry) => {
                let queue = entry.get_mut();

                if queue.session != session {
                    warn!(current = queue.session, session, "Not restoring a part into a newer session.");
                    return false;
                }

                queue.parts.push_front(part);
                true
            }
            Entry::Vacant(_) if !is_latest => {
                warn!(session, "Not restoring a part after its session was replaced.");
                false
            }
            Entry::Vacant(entry) => {
                // The failed pop drained the queue.
                entry.insert(PendingQueue {
                    session,
                    parts: VecDeque::from([part]),
                });
                true
            }
        }
    }

    async fn has(&self, recipient: &Recipient) -> bool {
        self.queues.contains_key(recipient)
    }

    async fn remaining(&self, recipient: &Recipient) -> usize {
        self.queues.get(recipient).map(|q| q.parts.len()).unwrap_or(0)
    }

    async fn clear(&self, recipient: &Recipient) -> bool {
        let retired = self.next_session_id();

        let mut latest = self.latest.entry(recipient.clone()).or_insert(retired);
        *latest = retired;

        self.queues.remove(recipient).is_some()
    }
}

// Tests.
