//! Lifecycle staging queue: deferred structural mutations per realm.
//!
//! [`StagingQueue`] decouples *discovering* that objects must be added or
//! removed (any thread, any time, typically from a batch hook mid-tick)
//! from *applying* the change (the loop thread, at a commit point).
//!
//! # Locking
//!
//! All realms share one re-entrant lock. A commit holds it for its whole
//! duration, including event delivery, so a commit is atomic per realm
//! with respect to concurrent [`stage()`](StagingQueue::stage) calls from
//! other threads. The queues are double-buffered: the commit swaps the
//! pending set out before applying it, so a subscriber that stages from
//! inside the commit (same thread, re-entrant) lands in the next commit.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tether_core::{RealmId, SceneObject, StructuralChanges};

/// Which pending sequence a staged object goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Add on the next commit.
    Addition,
    /// Remove on the next commit.
    Removal,
}

/// Pending additions and removals for one realm, in staging order.
#[derive(Default)]
pub(crate) struct RealmQueues {
    pub(crate) additions: Vec<Arc<dyn SceneObject>>,
    pub(crate) removals: Vec<Arc<dyn SceneObject>>,
}

impl RealmQueues {
    fn len(&self) -> usize {
        self.additions.len() + self.removals.len()
    }
}

type Pending = IndexMap<RealmId, RealmQueues>;

/// Thread-safe, cloneable handle to the shared staging queues.
///
/// Clones share the same queues.
#[derive(Clone, Default)]
pub struct StagingQueue {
    inner: Arc<ReentrantMutex<RefCell<Pending>>>,
}

impl StagingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append objects to a realm's pending additions or removals.
    ///
    /// Returns the number of objects staged. Never blocks on physics;
    /// only waits for a concurrent commit to finish.
    pub fn stage(
        &self,
        realm: RealmId,
        kind: MutationKind,
        objects: impl IntoIterator<Item = Arc<dyn SceneObject>>,
    ) -> usize {
        let mut objects = objects.into_iter().peekable();
        if objects.peek().is_none() {
            return 0;
        }
        let guard = self.inner.lock();
        let mut pending = guard.borrow_mut();
        let queues = pending.entry(realm).or_default();
        let target = match kind {
            MutationKind::Addition => &mut queues.additions,
            MutationKind::Removal => &mut queues.removals,
        };
        let before = target.len();
        target.extend(objects);
        target.len() - before
    }

    /// Stage everything a batch hook returned, under one lock acquisition.
    ///
    /// Returns `(additions, removals)` staged.
    pub fn stage_changes(&self, realm: RealmId, changes: StructuralChanges) -> (usize, usize) {
        let _guard = self.inner.lock();
        let added = self.stage(realm, MutationKind::Addition, changes.additions);
        let removed = self.stage(realm, MutationKind::Removal, changes.removals);
        (added, removed)
    }

    /// Total staged objects across all realms.
    pub fn pending_len(&self) -> usize {
        let guard = self.inner.lock();
        let pending = guard.borrow();
        pending.values().map(RealmQueues::len).sum()
    }

    /// `(additions, removals)` staged for one realm.
    pub fn pending_for(&self, realm: RealmId) -> (usize, usize) {
        let guard = self.inner.lock();
        let pending = guard.borrow();
        pending
            .get(&realm)
            .map_or((0, 0), |q| (q.additions.len(), q.removals.len()))
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    /// Drop everything staged for `realm`. Returns how many were dropped.
    pub fn discard_realm(&self, realm: RealmId) -> usize {
        let guard = self.inner.lock();
        let mut pending = guard.borrow_mut();
        pending.shift_remove(&realm).map_or(0, |q| q.len())
    }

    /// Acquire the shared mutation lock for a commit.
    pub(crate) fn lock(&self) -> CommitGuard<'_> {
        CommitGuard {
            guard: self.inner.lock(),
        }
    }
}

impl fmt::Debug for StagingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingQueue")
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Held for the duration of a commit.
pub(crate) struct CommitGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<Pending>>,
}

impl CommitGuard<'_> {
    /// Swap out everything staged so far, leaving empty queues behind.
    pub(crate) fn take(&self) -> Pending {
        mem::take(&mut *self.guard.borrow_mut())
    }
}
