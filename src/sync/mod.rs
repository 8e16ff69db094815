//! Entity-locking strategies and the primitives they are built from.
//!
//! # Module Organization
//!
//! - [`StripedEntityLocker`] - striped bookkeeping, usage-counted eviction
//! - [`UnboundedEntityLocker`] - single grow-only map, no eviction
//! - [`LockEntry`] - per-entity record (reentrant mutex + usage counter)
//! - [`ReentrantTimedMutex`] - timed, re-entrant mutual exclusion
//!
//! # Choosing a Strategy
//!
//! Both lockers implement [`EntityLocker`](crate::core::EntityLocker) and
//! are interchangeable at the contract level.
//!
//! **Prefer [`StripedEntityLocker`] when:**
//! - Entity IDs come and go (rows, documents, session keys)
//! - The process is long-lived and ID cardinality is unbounded
//! - You want memory proportional to *current* contention
//!
//! **[`UnboundedEntityLocker`] is acceptable when:**
//! - The set of distinct IDs over the process lifetime is small and bounded
//! - You want the least bookkeeping on the lock path
//!
//! The striped locker pays two brief stripe-lock acquisitions per operation
//! (checkout and retire); the unbounded locker pays one map-lock acquisition
//! and leaks an entry per distinct ID. Neither ever holds its bookkeeping
//! lock while blocking on an entity lock or while protected code runs.
//!
//! # Examples
//!
//! ```
//! use lockcraft::sync::StripedEntityLocker;
//! use lockcraft::core::EntityLocker;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let locker = Arc::new(StripedEntityLocker::<u64>::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let locker = Arc::clone(&locker);
//!         thread::spawn(move || {
//!             for id in 0..8 {
//!                 locker.run(&id, || Ok(())).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! // Contention has drained; the lock map is empty again.
//! assert_eq!(locker.entry_count(), 0);
//! ```

mod entry;
mod reentrant;
mod striped;
mod unbounded;

pub use entry::LockEntry;
pub use reentrant::ReentrantTimedMutex;
pub use striped::StripedEntityLocker;
pub use unbounded::UnboundedEntityLocker;

#[cfg(feature = "metrics")]
pub use striped::StripeStats;

/// Prelude for convenient locker imports.
pub mod prelude {
    pub use super::{StripedEntityLocker, UnboundedEntityLocker};
}
