//! Unbounded-map entity locker — the simple strategy.
//!
//! One map from entity ID to a shared [`ReentrantTimedMutex`], created on
//! first use and **never removed**. The map's own mutex is held only for the
//! find-or-create instant (the atomic insert-if-absent), never while
//! blocking on an entity lock or running protected code.
//!
//! The trade-off is deliberate: with no usage counters there is no retire
//! bookkeeping at all, but the map grows with the number of *distinct IDs
//! ever seen*. Use this strategy only when that set is bounded over the
//! process lifetime; otherwise reach for
//! [`StripedEntityLocker`](crate::sync::StripedEntityLocker), which evicts
//! idle entries.
//!
//! # Examples
//!
//! ```
//! use lockcraft::sync::UnboundedEntityLocker;
//! use lockcraft::core::EntityLocker;
//!
//! let locker = UnboundedEntityLocker::<u32>::new();
//!
//! locker.run(&1, || Ok(()))?;
//! locker.run(&2, || Ok(()))?;
//! locker.run(&1, || Ok(()))?;
//!
//! // Entries persist: two distinct IDs, two entries, forever.
//! assert_eq!(locker.entry_count(), 2);
//! # Ok::<(), lockcraft::LockCraftError>(())
//! ```

use crate::core::{EntityLocker, Protected};
use crate::error::{LockCraftError, Result};
use crate::sync::reentrant::ReentrantTimedMutex;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Default acquisition timeout: wait indefinitely.
const DEFAULT_TIMEOUT: Duration = Duration::MAX;

/// Releases the entity lock on drop if it was acquired.
///
/// The unbounded strategy has no usage counter to retire; the guard exists
/// so the unlock survives protected-code errors and panics.
struct AcquiredLock<'a> {
    lock: &'a ReentrantTimedMutex,
    locked: bool,
}

impl Drop for AcquiredLock<'_> {
    fn drop(&mut self) {
        if self.locked {
            self.lock.unlock();
        }
    }
}

/// Entity locker backed by a grow-only lock map.
///
/// Same execution contract as
/// [`StripedEntityLocker`](crate::sync::StripedEntityLocker) — per-entity
/// exclusion, re-entrancy, timeouts, execution-failure wrapping — without
/// eviction. See the [module docs](self) for when the simpler shape is
/// acceptable.
pub struct UnboundedEntityLocker<K> {
    locks: Mutex<HashMap<K, Arc<ReentrantTimedMutex>>>,
    default_timeout: Duration,
}

impl<K> UnboundedEntityLocker<K>
where
    K: Hash + Eq + Clone,
{
    /// Create a locker with an unbounded default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a locker with the given default timeout.
    #[must_use]
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            default_timeout,
        }
    }

    /// Find or create the lock for `id`.
    ///
    /// The map mutex is held only for this lookup; the clone of the `Arc`
    /// lets the caller block on the entity lock with the map free.
    fn entity_lock(&self, id: &K) -> Arc<ReentrantTimedMutex> {
        let mut locks = self.locks.lock();
        match locks.get(id) {
            Some(lock) => Arc::clone(lock),
            None => {
                let lock = Arc::new(ReentrantTimedMutex::new());
                locks.insert(id.clone(), Arc::clone(&lock));
                lock
            }
        }
    }

    fn execute<R, F>(&self, id: &K, protected: F, timeout: Duration) -> Result<R>
    where
        F: FnOnce() -> Protected<R>,
    {
        let lock = self.entity_lock(id);
        let mut acquired = AcquiredLock {
            lock: &lock,
            locked: false,
        };

        acquired.locked = acquired.lock.try_lock_for(timeout);
        if !acquired.locked {
            return Err(LockCraftError::timeout(timeout));
        }

        protected().map_err(|source| LockCraftError::Execution { source })
    }
}

impl<K> UnboundedEntityLocker<K> {
    /// Number of entries ever created; entries are never removed.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// The timeout applied by [`run`](EntityLocker::run) and
    /// [`call`](EntityLocker::call).
    #[inline]
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

impl<K> EntityLocker<K> for UnboundedEntityLocker<K>
where
    K: Hash + Eq + Clone,
{
    fn call<R, F>(&self, id: &K, protected: F) -> Result<R>
    where
        F: FnOnce() -> Protected<R>,
    {
        self.execute(id, protected, self.default_timeout)
    }

    fn call_with_timeout<R, F>(&self, id: &K, protected: F, timeout: Duration) -> Result<R>
    where
        F: FnOnce() -> Protected<R>,
    {
        self.execute(id, protected, timeout)
    }
}

impl<K> Default for UnboundedEntityLocker<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for UnboundedEntityLocker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundedEntityLocker")
            .field("entry_count", &self.entry_count())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl<K> fmt::Display for UnboundedEntityLocker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UnboundedEntityLocker({} entries)",
            self.entry_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_call_returns_value() {
        let locker = UnboundedEntityLocker::<&str>::new();
        let value = locker.call(&"id", || Ok(11)).unwrap();
        assert_eq!(value, 11);
    }

    #[test]
    fn test_entries_are_never_evicted() {
        let locker = UnboundedEntityLocker::<u64>::new();

        for id in 0..10 {
            locker.run(&id, || Ok(())).unwrap();
        }
        assert_eq!(locker.entry_count(), 10);

        // Reusing an ID reuses its entry.
        locker.run(&0, || Ok(())).unwrap();
        assert_eq!(locker.entry_count(), 10);
    }

    #[test]
    fn test_reentrant_nested_calls() {
        let locker = UnboundedEntityLocker::<u64>::new();
        let order = RefCell::new(Vec::new());

        locker
            .run(&42, || {
                locker.run(&42, || {
                    order.borrow_mut().push("1");
                    Ok(())
                })?;
                order.borrow_mut().push("2");
                Ok(())
            })
            .unwrap();

        assert_eq!(*order.borrow(), ["1", "2"]);
    }

    #[test]
    fn test_execution_failure_releases_lock() {
        let locker = UnboundedEntityLocker::<&str>::new();

        let result: Result<()> = locker.call(&"x", || Err("boom".into()));
        assert!(matches!(result, Err(LockCraftError::Execution { .. })));

        let value = locker
            .call_with_timeout(&"x", || Ok(3), Duration::ZERO)
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_panic_in_protected_code_releases_lock() {
        let locker = UnboundedEntityLocker::<u64>::new();

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = locker.run(&3, || panic!("protected code exploded"));
        }));
        assert!(panicked.is_err());

        locker
            .run_with_timeout(&3, || Ok(()), Duration::ZERO)
            .unwrap();
    }

    #[test]
    fn test_debug_display() {
        let locker = UnboundedEntityLocker::<u64>::new();
        locker.run(&1, || Ok(())).unwrap();

        let debug_str = format!("{:?}", locker);
        assert!(debug_str.contains("UnboundedEntityLocker"));
        assert!(debug_str.contains("entry_count"));

        let display_str = format!("{}", locker);
        assert!(display_str.contains("1 entries"));
    }

    #[test]
    fn test_send_sync_markers() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UnboundedEntityLocker<String>>();
    }
}
