//! The per-entity lock record: a re-entrant mutex plus a usage counter.
//!
//! `LockEntry` is a pure leaf. It knows nothing about maps or stripes; it
//! pairs a [`ReentrantTimedMutex`] with an atomic count of the threads
//! currently interested in it (attempting, holding, or retiring). The
//! striped strategy uses the counter to decide when an entry may be evicted
//! from the lock map.
//!
//! Increment and decrement are atomic and safe without external locking.
//! The *eviction decision* based on [`is_in_use`](LockEntry::is_in_use) is
//! not: it must be made under the stripe lock for the entry's ID, or a
//! freshly checked-out entry could be removed from under its user.

use crate::sync::reentrant::ReentrantTimedMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Exclusivity record for one entity ID.
///
/// # Usage protocol
///
/// Every thread interested in the entry calls
/// [`acquire_usage`](Self::acquire_usage) *before* attempting the lock and
/// exactly one matching [`release_usage`](Self::release_usage) when done,
/// whether or not acquisition succeeded. An entry with a non-zero counter
/// must stay in the lock map.
#[derive(Debug)]
pub struct LockEntry {
    users: AtomicUsize,
    lock: ReentrantTimedMutex,
}

impl LockEntry {
    /// Create an entry with an unlocked mutex and a usage count of zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            users: AtomicUsize::new(0),
            lock: ReentrantTimedMutex::new(),
        }
    }

    /// Register one more thread interested in this entry.
    #[inline]
    pub fn acquire_usage(&self) {
        self.users.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one thread's interest, returning the remaining usage count.
    #[inline]
    pub fn release_usage(&self) -> usize {
        let previous = self.users.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "usage counter underflow");
        previous - 1
    }

    /// Whether any thread is attempting, holding, or retiring this entry.
    #[inline]
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.users.load(Ordering::Acquire) != 0
    }

    /// Current usage count.
    #[inline]
    #[must_use]
    pub fn usage(&self) -> usize {
        self.users.load(Ordering::Acquire)
    }

    /// Attempt to acquire the entry's mutex, blocking up to `timeout`.
    ///
    /// Delegates to [`ReentrantTimedMutex::try_lock_for`]: re-entrant for
    /// the owning thread, `false` on timeout.
    #[inline]
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        self.lock.try_lock_for(timeout)
    }

    /// Release one hold on the entry's mutex.
    #[inline]
    pub fn unlock(&self) {
        self.lock.unlock();
    }

    /// Whether the entry's mutex is currently held by any thread.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl Default for LockEntry {
    fn default() -> Self {
        Self::new()
    }
}
