//! Striped, usage-counted entity locker — the production strategy.
//!
//! # Design Philosophy
//!
//! A locker must answer two questions concurrently: "which lock protects
//! entity X?" (bookkeeping) and "may I enter X's critical section?"
//! (exclusion). This implementation keeps the two strictly apart:
//!
//! - A fixed array of **stripes** guards bookkeeping. Each stripe owns the
//!   map segment for the entity IDs that hash to it, so find-or-create,
//!   usage increments, and eviction for an ID all serialize through that
//!   ID's stripe lock — and through nothing wider.
//! - A per-entity [`LockEntry`] guards the protected code itself. Blocking
//!   on it never happens while a stripe lock is held, so a slow critical
//!   section for one entity cannot stall bookkeeping for unrelated entities
//!   that share its stripe.
//!
//! Entries are created lazily on first use and evicted as soon as their
//! usage counter returns to zero, so the lock map is bounded by the number
//! of entities currently in contention rather than by the number of IDs
//! ever seen. The eviction decision is made under the same stripe lock that
//! find-or-create uses; a counter observed at zero there cannot be
//! resurrected by a concurrent checkout.
//!
//! ## Stripe Selection
//!
//! Uses **Lemire's fast range reduction** over the standard hasher's output:
//!
//! ```text
//! stripe_idx = floor((hash × stripe_count) / 2^64)
//! ```
//!
//! Implemented as `((hash as u128 * stripe_count as u128) >> 64) as usize`.
//! Uniform when the hash is uniform, and cheaper than a modulo.
//!
//! **Reference:** Lemire, D. (2016). "A fast alternative to the modulo
//! reduction." [arXiv:1805.10941](https://arxiv.org/abs/1805.10941)
//!
//! ## Locking Protocol
//!
//! | Phase    | Stripe lock | Entity lock | Duration                     |
//! |----------|-------------|-------------|------------------------------|
//! | checkout | held        | not touched | brief (map get/insert + inc) |
//! | acquire  | free        | blocking    | up to the caller's timeout   |
//! | run      | free        | held        | caller's protected code      |
//! | retire   | held        | released    | brief (unlock + dec + evict) |
//!
//! The retire phase releases the entity lock *while holding the stripe
//! lock*: released-but-undecremented is the window in which a concurrent
//! retire could otherwise observe the entry idle and evict it out from
//! under a thread that just found it in the map.
//!
//! Retire runs on every exit path — success, timeout, protected-code error,
//! or panic — via a drop guard, so a checkout can never leak a usage
//! increment or a map entry.
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```
//! use lockcraft::sync::StripedEntityLocker;
//! use lockcraft::core::EntityLocker;
//!
//! let locker = StripedEntityLocker::<String>::new();
//!
//! let balance = locker.call(&"account-7".to_string(), || Ok(100_u64))?;
//! assert_eq!(balance, 100);
//!
//! // Idle entities do not linger in the lock map.
//! assert_eq!(locker.entry_count(), 0);
//! # Ok::<(), lockcraft::LockCraftError>(())
//! ```
//!
//! ## Concurrent Access
//!
//! ```
//! use lockcraft::sync::StripedEntityLocker;
//! use lockcraft::core::EntityLocker;
//! use std::sync::Arc;
//!
//! let locker = Arc::new(StripedEntityLocker::<u64>::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let locker = Arc::clone(&locker);
//!         std::thread::spawn(move || {
//!             for id in 0..16 {
//!                 locker.run(&id, || Ok(())).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(locker.entry_count(), 0);
//! ```
//!
//! ## Re-entrant Calls
//!
//! ```
//! use lockcraft::sync::StripedEntityLocker;
//! use lockcraft::core::EntityLocker;
//!
//! let locker = StripedEntityLocker::<&str>::new();
//!
//! // A nested call on the same ID from inside the critical section does
//! // not deadlock against the outer hold.
//! let value = locker.call(&"doc", || {
//!     let inner = locker.call(&"doc", || Ok(1))?;
//!     Ok(inner + 1)
//! })?;
//! assert_eq!(value, 2);
//! # Ok::<(), lockcraft::LockCraftError>(())
//! ```

use crate::core::{EntityLocker, Protected};
use crate::error::{LockCraftError, Result};
use crate::sync::entry::LockEntry;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Default number of stripes.
///
/// Balances bookkeeping contention against the up-front cost of the stripe
/// array; raise it via [`StripedEntityLocker::with_stripe_count`] when many
/// threads churn through many distinct IDs.
const DEFAULT_STRIPE_COUNT: usize = 32;

/// Default acquisition timeout: wait indefinitely.
///
/// `Duration::MAX` overflows any `Instant` deadline and therefore waits
/// untimed (see [`crate::sync::ReentrantTimedMutex::try_lock_for`]).
const DEFAULT_TIMEOUT: Duration = Duration::MAX;

/// Hash an entity ID to a `u64` with the standard hasher.
#[inline]
fn hash_id<K: Hash>(id: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

/// One stripe: the lock-map segment for the entity IDs hashing here.
///
/// Cache-line aligned so that stripes touched by different threads do not
/// share a line.
#[repr(align(64))]
struct Stripe<K> {
    entries: Mutex<HashMap<K, Arc<LockEntry>>>,

    /// Total checkouts routed through this stripe (requires `metrics`).
    #[cfg(feature = "metrics")]
    checkouts: AtomicU64,

    /// Total retires routed through this stripe (requires `metrics`).
    #[cfg(feature = "metrics")]
    releases: AtomicU64,

    /// Nanoseconds spent waiting for this stripe's lock (requires
    /// `metrics`). High values relative to other stripes indicate a hot
    /// stripe; consider a larger stripe count.
    #[cfg(feature = "metrics")]
    contention_ns: AtomicU64,
}

impl<K> Stripe<K> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            #[cfg(feature = "metrics")]
            checkouts: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            releases: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            contention_ns: AtomicU64::new(0),
        }
    }
}

/// Per-stripe bookkeeping statistics (requires `metrics` feature).
///
/// Collected via [`StripedEntityLocker::stripe_stats`]; useful for spotting
/// hot stripes and sizing the stripe count.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeStats {
    /// Stripe index in range [0, stripe_count).
    pub stripe_idx: usize,

    /// Total checkout operations (find-or-create + usage increment).
    pub checkouts: u64,

    /// Total retire operations (unlock + usage decrement + maybe-evict).
    pub releases: u64,

    /// Total nanoseconds spent waiting to acquire this stripe's lock.
    pub contention_ns: u64,
}

/// Entity locker with striped bookkeeping and usage-counted eviction.
///
/// The production strategy: lock entries are created lazily, shared through
/// the map while in use, and evicted the moment no thread is interested in
/// them, so memory tracks *current contention*, not ID cardinality. See the
/// [module docs](self) for the locking protocol.
///
/// # Type Parameters
///
/// - `K`: entity ID type (`Hash + Eq + Clone`; `Send` to cross threads)
///
/// # Thread Safety
///
/// All methods take `&self`; share the locker with `Arc`. Two lockers never
/// share entries — exclusion is always relative to one locker instance.
pub struct StripedEntityLocker<K> {
    /// Fixed at construction; never resized.
    stripes: Box<[Stripe<K>]>,
    default_timeout: Duration,
}

/// A checked-out lock entry, retired on drop.
///
/// Dropping performs the full retire phase (unlock if held, usage
/// decrement, eviction at zero) under the stripe lock, which makes
/// bookkeeping unconditional: early returns, protected-code errors, and
/// panics all pass through here.
struct CheckedOutEntry<'a, K: Hash + Eq> {
    locker: &'a StripedEntityLocker<K>,
    id: &'a K,
    stripe_idx: usize,
    entry: Arc<LockEntry>,
    locked: bool,
}

impl<K: Hash + Eq> Drop for CheckedOutEntry<'_, K> {
    fn drop(&mut self) {
        self.locker
            .release_entry(self.stripe_idx, self.id, &self.entry, self.locked);
    }
}

impl<K> StripedEntityLocker<K>
where
    K: Hash + Eq + Clone,
{
    /// Create a locker with 32 stripes and an unbounded default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DEFAULT_TIMEOUT, DEFAULT_STRIPE_COUNT)
    }

    /// Create a locker with 32 stripes and the given default timeout.
    ///
    /// The default timeout applies to [`run`](EntityLocker::run) and
    /// [`call`](EntityLocker::call); the `*_with_timeout` variants override
    /// it per call.
    #[must_use]
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self::build(default_timeout, DEFAULT_STRIPE_COUNT)
    }

    /// Create a locker with an explicit stripe count.
    ///
    /// More stripes reduce the chance that bookkeeping for unrelated
    /// entities contends on the same lock, at the cost of a larger up-front
    /// stripe array.
    ///
    /// # Errors
    ///
    /// Returns [`LockCraftError::InvalidParameters`] if `stripe_count` is 0.
    pub fn with_stripe_count(default_timeout: Duration, stripe_count: usize) -> Result<Self> {
        if stripe_count == 0 {
            return Err(LockCraftError::invalid_parameters(
                "stripe count must be greater than 0",
            ));
        }
        Ok(Self::build(default_timeout, stripe_count))
    }

    /// Create a locker with a stripe count adapted to an expected number of
    /// concurrent threads.
    ///
    /// Chooses `clamp(next_power_of_two(threads × 4), 16, 4096)` stripes:
    /// four stripes per thread spreads bookkeeping load, the floor keeps
    /// distribution reasonable at low concurrency, and the cap bounds the
    /// stripe array's memory.
    ///
    /// # Errors
    ///
    /// Returns [`LockCraftError::InvalidParameters`] if `concurrency_level`
    /// is 0.
    pub fn with_concurrency(default_timeout: Duration, concurrency_level: usize) -> Result<Self> {
        if concurrency_level == 0 {
            return Err(LockCraftError::invalid_parameters(
                "concurrency level must be greater than 0",
            ));
        }
        let base = (concurrency_level * 4).max(16);
        let stripe_count = base.next_power_of_two().min(4096);
        Self::with_stripe_count(default_timeout, stripe_count)
    }

    /// `stripe_count` must be non-zero; validated by the public
    /// constructors.
    fn build(default_timeout: Duration, stripe_count: usize) -> Self {
        let stripes: Box<[Stripe<K>]> = (0..stripe_count)
            .map(|_| Stripe::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            stripes,
            default_timeout,
        }
    }

    /// Find or create the entry for `id` and register interest in it.
    ///
    /// Runs entirely under the stripe lock; the returned `Arc` keeps the
    /// entry alive even if a faster thread retires and evicts it before the
    /// caller attempts acquisition (the usage increment prevents exactly
    /// that, but the `Arc` also makes the race harmless at the memory
    /// level).
    fn checkout_entry(&self, id: &K) -> (usize, Arc<LockEntry>) {
        let stripe_idx = self.select_stripe(id);
        let stripe = &self.stripes[stripe_idx];

        #[cfg(feature = "metrics")]
        let wait_started = Instant::now();

        let mut entries = stripe.entries.lock();

        #[cfg(feature = "metrics")]
        {
            stripe.checkouts.fetch_add(1, AtomicOrdering::Relaxed);
            stripe.contention_ns.fetch_add(
                wait_started.elapsed().as_nanos() as u64,
                AtomicOrdering::Relaxed,
            );
        }

        let entry = match entries.get(id) {
            Some(entry) => Arc::clone(entry),
            None => {
                let entry = Arc::new(LockEntry::new());
                entries.insert(id.clone(), Arc::clone(&entry));
                entry
            }
        };
        entry.acquire_usage();
        (stripe_idx, entry)
    }

    /// Acquire, run, retire.
    fn execute<R, F>(&self, id: &K, protected: F, timeout: Duration) -> Result<R>
    where
        F: FnOnce() -> Protected<R>,
    {
        let (stripe_idx, entry) = self.checkout_entry(id);
        let mut checked_out = CheckedOutEntry {
            locker: self,
            id,
            stripe_idx,
            entry,
            locked: false,
        };

        // The only long block in the whole operation, taken with no stripe
        // lock held.
        checked_out.locked = checked_out.entry.try_lock_for(timeout);
        if !checked_out.locked {
            return Err(LockCraftError::timeout(timeout));
        }

        protected().map_err(|source| LockCraftError::Execution { source })
    }
}

impl<K> StripedEntityLocker<K>
where
    K: Hash + Eq,
{
    /// Select the stripe for `id` via Lemire's range reduction.
    #[inline]
    fn select_stripe(&self, id: &K) -> usize {
        let stripe_count = self.stripes.len();
        debug_assert!(stripe_count > 0, "stripe array cannot be empty");

        let stripe_idx = ((hash_id(id) as u128 * stripe_count as u128) >> 64) as usize;

        debug_assert!(
            stripe_idx < stripe_count,
            "stripe_idx {} out of bounds [0, {})",
            stripe_idx,
            stripe_count
        );
        stripe_idx
    }

    /// The retire phase: unlock (if held), decrement usage, evict at zero.
    ///
    /// The entity lock is released *inside* the stripe critical section:
    /// between an unlock outside it and the decrement, a concurrent retire
    /// could observe the entry idle and evict it while a third thread still
    /// expects to find it in the map.
    fn release_entry(&self, stripe_idx: usize, id: &K, entry: &LockEntry, locked: bool) {
        let stripe = &self.stripes[stripe_idx];

        #[cfg(feature = "metrics")]
        let wait_started = Instant::now();

        let mut entries = stripe.entries.lock();

        #[cfg(feature = "metrics")]
        {
            stripe.releases.fetch_add(1, AtomicOrdering::Relaxed);
            stripe.contention_ns.fetch_add(
                wait_started.elapsed().as_nanos() as u64,
                AtomicOrdering::Relaxed,
            );
        }

        if locked {
            entry.unlock();
        }
        if entry.release_usage() == 0 {
            entries.remove(id);
        }
    }
}

impl<K> StripedEntityLocker<K> {
    /// Number of stripes, fixed at construction.
    #[inline]
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Number of live entries across all stripes.
    ///
    /// Locks each stripe briefly; the result is a point-in-time aggregate,
    /// not an atomic snapshot. After all contention on an ID drains, its
    /// entry is gone and no longer counted here.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.stripes
            .iter()
            .map(|stripe| stripe.entries.lock().len())
            .sum()
    }

    /// The timeout applied by [`run`](EntityLocker::run) and
    /// [`call`](EntityLocker::call).
    #[inline]
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Per-stripe bookkeeping statistics (requires `metrics` feature).
    ///
    /// O(stripe_count) relaxed atomic loads.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn stripe_stats(&self) -> Vec<StripeStats> {
        self.stripes
            .iter()
            .enumerate()
            .map(|(stripe_idx, stripe)| StripeStats {
                stripe_idx,
                checkouts: stripe.checkouts.load(AtomicOrdering::Relaxed),
                releases: stripe.releases.load(AtomicOrdering::Relaxed),
                contention_ns: stripe.contention_ns.load(AtomicOrdering::Relaxed),
            })
            .collect()
    }

    /// Indices of the most contended stripes, descending (requires
    /// `metrics` feature).
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn most_contended_stripes(&self, top_n: usize) -> Vec<usize> {
        let mut stats = self.stripe_stats();
        stats.sort_by_key(|s| std::cmp::Reverse(s.contention_ns));
        stats.into_iter().take(top_n).map(|s| s.stripe_idx).collect()
    }
}

impl<K> EntityLocker<K> for StripedEntityLocker<K>
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

impl<K> Default for StripedEntityLocker<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for StripedEntityLocker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripedEntityLocker")
            .field("stripe_count", &self.stripes.len())
            .field("entry_count", &self.entry_count())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl<K> fmt::Display for StripedEntityLocker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StripedEntityLocker({} stripes, {} live entries)",
            self.stripes.len(),
            self.entry_count()
        )
    }
}
