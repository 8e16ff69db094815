//! Re-entrant mutual exclusion with timed acquisition and explicit release.
//!
//! # Why not a guard-based mutex?
//!
//! The striped strategy must release an entity's lock *while holding the
//! stripe lock for that entity* (see [`crate::sync::striped`]); an RAII
//! guard cannot be carried across that boundary without borrowing the entry
//! it came from. This primitive therefore exposes `try_lock_for` / `unlock`
//! as explicit operations, and emulates re-entrancy the classic way: the
//! owning [`ThreadId`] plus a hold count, guarded by a `parking_lot::Mutex`
//! with a `Condvar` for timed waiting.
//!
//! # Semantics
//!
//! - A thread that already owns the lock re-acquires it immediately; the
//!   hold count increases and the lock is released to other threads only at
//!   the matching final [`unlock`](ReentrantTimedMutex::unlock).
//! - `try_lock_for(Duration::ZERO)` is a single non-blocking attempt.
//! - A timeout so large that the deadline overflows `Instant` (notably
//!   `Duration::MAX`) waits untimed.
//! - No fairness: on release every waiter is woken and they race.
//!
//! # Examples
//!
//! ```
//! use lockcraft::sync::ReentrantTimedMutex;
//! use std::time::Duration;
//!
//! let lock = ReentrantTimedMutex::new();
//!
//! assert!(lock.try_lock_for(Duration::ZERO));
//! assert!(lock.try_lock_for(Duration::ZERO)); // re-entrant
//! lock.unlock();
//! assert!(lock.is_locked()); // still held once
//! lock.unlock();
//! assert!(!lock.is_locked());
//! ```

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Owner identity and hold depth. `owner == None` means the lock is free and
/// `holds` is 0.
#[derive(Debug)]
struct OwnerState {
    owner: Option<ThreadId>,
    holds: usize,
}

/// A re-entrant mutex supporting blocking acquisition with a timeout.
///
/// See the [module docs](self) for semantics. The primitive knows nothing of
/// lock maps or usage counters; [`crate::sync::LockEntry`] composes it with
/// the bookkeeping the striped strategy needs.
#[derive(Debug)]
pub struct ReentrantTimedMutex {
    state: Mutex<OwnerState>,
    released: Condvar,
}

impl ReentrantTimedMutex {
    /// Create an unlocked mutex.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(OwnerState {
                owner: None,
                holds: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Attempt to acquire the lock, blocking up to `timeout`.
    ///
    /// Returns `true` if the lock is now held by the calling thread (either
    /// freshly acquired or re-entered). Returns `false` if the timeout
    /// elapsed first; in that case the caller must NOT call
    /// [`unlock`](Self::unlock).
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.holds += 1;
            return true;
        }

        // Deadlines that overflow Instant (Duration::MAX and friends) wait
        // untimed.
        let deadline = Instant::now().checked_add(timeout);

        while state.owner.is_some() {
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut state, deadline).timed_out()
                        && state.owner.is_some()
                    {
                        return false;
                    }
                }
                None => self.released.wait(&mut state),
            }
        }

        state.owner = Some(me);
        state.holds = 1;
        true
    }

    /// Release one hold on the lock.
    ///
    /// The lock becomes available to other threads only when the hold count
    /// of the owning thread reaches zero. Calling `unlock` from a thread
    /// that does not own the lock is a bug; debug builds assert, release
    /// builds ignore the call.
    pub fn unlock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();

        debug_assert_eq!(state.owner, Some(me), "unlock by non-owning thread");
        if state.owner != Some(me) {
            return;
        }

        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            // Wake every waiter: with notify_one, the single wakeup could
            // land on a waiter that is about to time out and be lost.
            self.released.notify_all();
        }
    }

    /// Whether any thread currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Whether the calling thread currently holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }
}

impl Default for ReentrantTimedMutex {
    fn default() -> Self {
        Self::new()
    }
}
