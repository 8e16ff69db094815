//! LockCraft: entity-scoped locking for Rust.
//!
//! LockCraft serializes work *per entity ID* instead of per resource: two
//! operations on account `A` run one after the other, while operations on
//! accounts `A` and `B` run side by side. It is the building block for
//! systems that protect individually-addressable records (rows, accounts,
//! documents) under high concurrency without a single global lock.
//!
//! # Quick Start
//!
//! ```
//! use lockcraft::sync::StripedEntityLocker;
//! use lockcraft::core::EntityLocker;
//!
//! let locker = StripedEntityLocker::<String>::new();
//!
//! // Side-effecting work under the entity's lock.
//! let mut audit_log = Vec::new();
//! locker.run(&"account-7".to_string(), || {
//!     audit_log.push("debit 100");
//!     Ok(())
//! })?;
//!
//! // Value-returning work.
//! let balance = locker.call(&"account-7".to_string(), || Ok(900_u64))?;
//! assert_eq!(balance, 900);
//! # Ok::<(), lockcraft::LockCraftError>(())
//! ```
//!
//! # The Contract
//!
//! Every locker implements [`EntityLocker`](crate::core::EntityLocker):
//!
//! - [`run`](crate::core::EntityLocker::run) / [`call`](crate::core::EntityLocker::call)
//!   execute a closure under the entity's lock with the locker's default
//!   timeout; `call` propagates the closure's value.
//! - [`run_with_timeout`](crate::core::EntityLocker::run_with_timeout) /
//!   [`call_with_timeout`](crate::core::EntityLocker::call_with_timeout) take an
//!   explicit [`Duration`](std::time::Duration).
//!
//! Guarantees, per locker instance:
//!
//! - **Exclusion**: at most one thread runs protected code for a given ID
//!   at any instant.
//! - **Independence**: distinct IDs never wait on each other beyond brief
//!   lock-map bookkeeping.
//! - **Re-entrancy**: a thread may call back in with the same ID from
//!   inside its own critical section without deadlocking.
//! - **Timeouts**: acquisition that does not succeed within the timeout
//!   fails with [`LockCraftError::Timeout`] and runs nothing.
//! - **Failure isolation**: errors from protected code come back as
//!   [`LockCraftError::Execution`] with the original error as the cause;
//!   the lock is always released.
//!
//! # Choosing a Locker
//!
//! | Locker | Lock map | Best for |
//! |--------|----------|----------|
//! | [`StripedEntityLocker`](sync::StripedEntityLocker) | bounded by live contention (usage-counted eviction) | long-lived processes, unbounded ID cardinality |
//! | [`UnboundedEntityLocker`](sync::UnboundedEntityLocker) | one entry per ID ever seen, never evicted | small, fixed ID sets; minimal bookkeeping |
//!
//! Both are built on [`ReentrantTimedMutex`](sync::ReentrantTimedMutex), a
//! re-entrant mutex with timed acquisition, so nested calls on the same ID
//! from the owning thread always proceed.
//!
//! # Features
//!
//! - `metrics` - per-stripe bookkeeping statistics
//!   ([`stripe_stats`](sync::StripedEntityLocker::stripe_stats)) for
//!   spotting hot stripes and sizing the stripe count.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/lockcraft/0.1.0")]

/// Core trait and protected-closure aliases
pub mod core;

/// Error types and result aliases
pub mod error;

/// Locking strategies and primitives
pub mod sync;

// Re-export commonly used types at crate root
pub use error::{LockCraftError, ProtectedError, Result};

// Re-export the contract
pub use crate::core::{EntityLocker, Protected};

// Re-export the strategies at the crate root
pub use sync::{StripedEntityLocker, UnboundedEntityLocker};

#[cfg(feature = "metrics")]
pub use sync::StripeStats;

/// Prelude module for convenient imports.
///
/// # Examples
///
/// ```
/// use lockcraft::prelude::*;
///
/// let locker = StripedEntityLocker::<u64>::new();
/// locker.run(&1, || Ok(()))?;
/// # Ok::<(), LockCraftError>(())
/// ```
pub mod prelude {
    pub use crate::core::{EntityLocker, Protected};
    pub use crate::error::{LockCraftError, ProtectedError, Result};
    pub use crate::sync::{ReentrantTimedMutex, StripedEntityLocker, UnboundedEntityLocker};

    #[cfg(feature = "metrics")]
    pub use crate::sync::StripeStats;
}
