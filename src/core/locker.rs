//! The entity locker contract.
//!
//! This module defines the trait every locking strategy must implement. The
//! contract is deliberately small: run a caller-supplied closure while
//! holding the lock for one entity ID, with either the locker's default
//! timeout or an explicit one.
//!
//! # Design Principles
//!
//! 1. **Per-entity exclusivity**: at most one thread executes protected code
//!    for a given (locker, ID) pair at any instant.
//! 2. **Independence across IDs**: work on distinct IDs may overlap freely;
//!    the only cross-ID coupling is brief lock-map bookkeeping.
//! 3. **Re-entrancy**: a thread may call back into the locker with the same
//!    ID from inside its own critical section without deadlocking.
//! 4. **At-most-once execution**: the closure runs exactly once if the lock
//!    is acquired and not at all otherwise.
//!
//! # The protected closure
//!
//! Protected code is an `FnOnce` returning [`Protected<R>`]. Returning
//! `Err` does not poison anything: the lock is released, bookkeeping runs,
//! and the caller receives [`LockCraftError::Execution`] with the original
//! error as its cause. A panic inside the closure likewise releases the lock
//! and retires bookkeeping (via the strategies' drop guards) before
//! propagating.
//!
//! [`LockCraftError::Execution`]: crate::error::LockCraftError::Execution

use crate::error::{ProtectedError, Result};
use std::time::Duration;

/// Outcome of a protected closure: a value, or the error to surface as the
/// cause of an execution failure.
pub type Protected<R> = std::result::Result<R, ProtectedError>;

/// Mutual exclusion scoped to an entity ID.
///
/// Implementations differ only in how they map IDs to locks and reclaim
/// idle entries; the execution contract is identical. All methods take
/// `&self`: lockers synchronize internally and are shared via `Arc`.
///
/// # Type Parameters
///
/// - `K`: the entity ID type. Opaque to the locker beyond hashing and
///   equality.
///
/// # Examples
///
/// ```
/// use lockcraft::core::EntityLocker;
/// use lockcraft::sync::StripedEntityLocker;
///
/// let locker = StripedEntityLocker::<u64>::new();
///
/// // Side-effecting unit of work under entity 7's lock.
/// let mut hits = 0;
/// locker.run(&7, || {
///     hits += 1;
///     Ok(())
/// })?;
/// assert_eq!(hits, 1);
///
/// // Value-returning unit of work.
/// let doubled = locker.call(&7, || Ok(21 * 2))?;
/// assert_eq!(doubled, 42);
/// # Ok::<(), lockcraft::LockCraftError>(())
/// ```
pub trait EntityLocker<K> {
    /// Run value-returning protected code under the entity's lock, using the
    /// locker's default timeout.
    ///
    /// # Errors
    ///
    /// - [`Timeout`] if the lock was not acquired in time (the closure did
    ///   not run).
    /// - [`Execution`] if the closure returned an error; the original error
    ///   is preserved as the cause.
    ///
    /// [`Timeout`]: crate::error::LockCraftError::Timeout
    /// [`Execution`]: crate::error::LockCraftError::Execution
    fn call<R, F>(&self, id: &K, protected: F) -> Result<R>
    where
        F: FnOnce() -> Protected<R>;

    /// Run value-returning protected code under the entity's lock, waiting
    /// at most `timeout` for acquisition.
    ///
    /// A zero timeout degenerates to a single non-blocking attempt;
    /// `Duration::MAX` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Same as [`call`](EntityLocker::call).
    fn call_with_timeout<R, F>(&self, id: &K, protected: F, timeout: Duration) -> Result<R>
    where
        F: FnOnce() -> Protected<R>;

    /// Run side-effecting protected code under the entity's lock, using the
    /// locker's default timeout.
    ///
    /// Equivalent to [`call`](EntityLocker::call) with `R = ()`.
    ///
    /// # Errors
    ///
    /// Same as [`call`](EntityLocker::call).
    fn run<F>(&self, id: &K, protected: F) -> Result<()>
    where
        F: FnOnce() -> Protected<()>,
    {
        self.call(id, protected)
    }

    /// Run side-effecting protected code under the entity's lock, waiting at
    /// most `timeout` for acquisition.
    ///
    /// # Errors
    ///
    /// Same as [`call`](EntityLocker::call).
    fn run_with_timeout<F>(&self, id: &K, protected: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() -> Protected<()>,
    {
        self.call_with_timeout(id, protected, timeout)
    }
}
