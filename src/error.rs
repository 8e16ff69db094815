//! Error types for lockcraft operations.
//!
//! Three things can go wrong when executing protected code against an entity
//! lock, and each is a distinct variant so callers can branch on them:
//!
//! - [`LockCraftError::InvalidParameters`] — a locker was misconfigured
//!   (e.g. zero stripes). Detected before any lock map exists.
//! - [`LockCraftError::Timeout`] — the entity lock could not be acquired in
//!   time. The protected code never ran.
//! - [`LockCraftError::Execution`] — the protected code itself failed while
//!   the lock was held. The original error is preserved as the [`source`].
//!
//! [`source`]: std::error::Error::source
//!
//! # Error Propagation
//!
//! ```
//! use lockcraft::{LockCraftError, Result};
//!
//! fn validate_stripes(stripes: usize) -> Result<()> {
//!     if stripes == 0 {
//!         return Err(LockCraftError::invalid_parameters(
//!             "stripe count must be greater than 0",
//!         ));
//!     }
//!     Ok(())
//! }
//! # assert!(validate_stripes(32).is_ok());
//! # assert!(validate_stripes(0).is_err());
//! ```

use std::fmt;
use std::time::Duration;

/// Error type carried by protected code out of a critical section.
///
/// Protected closures return `Result<R, ProtectedError>`; any error they
/// produce is wrapped in [`LockCraftError::Execution`] with the original
/// value preserved as the cause. The `Send + Sync` bounds keep lockers usable
/// across threads.
pub type ProtectedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for lockcraft operations.
///
/// All fallible operations in this crate return [`Result<T>`] where the error
/// type is [`LockCraftError`].
pub type Result<T> = std::result::Result<T, LockCraftError>;

/// Errors that can occur while configuring a locker or executing protected
/// code under an entity lock.
///
/// # Design Notes
/// - `Timeout` always implies the protected code did not run.
/// - `Execution` always implies the lock was acquired, the code ran, and the
///   lock has since been released.
/// - There is no `Clone`/`PartialEq`: the `Execution` cause is an arbitrary
///   boxed error. Match on variants with `matches!` instead.
#[derive(Debug)]
pub enum LockCraftError {
    /// Invalid locker configuration.
    ///
    /// Raised during construction, before any lock map or stripe exists.
    /// The remaining argument errors of the contract (absent entity ID,
    /// absent closure, negative or unit-less timeouts) are unrepresentable
    /// in this API and need no runtime check.
    InvalidParameters {
        /// Human-readable description of what's invalid.
        message: String,
    },

    /// The entity lock could not be acquired within the requested duration.
    ///
    /// The usage-counter bookkeeping for the attempt has still been retired;
    /// a timed-out waiter never leaks a map entry.
    Timeout {
        /// The timeout that elapsed without obtaining the lock.
        waited: Duration,
    },

    /// The protected code failed while the entity lock was held.
    ///
    /// The lock has been released and bookkeeping performed; `source`
    /// carries the error the protected code returned.
    Execution {
        /// The original error raised inside the critical section.
        source: ProtectedError,
    },
}

impl fmt::Display for LockCraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameters { message } => {
                write!(f, "Invalid locker parameters: {}.", message)
            }
            Self::Timeout { waited } => {
                write!(
                    f,
                    "Entity lock not acquired within {:?}; protected code did not run.",
                    waited
                )
            }
            Self::Execution { source } => {
                write!(f, "Protected code failed under entity lock: {}.", source)
            }
        }
    }
}

impl std::error::Error for LockCraftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Execution { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl LockCraftError {
    /// Create an `InvalidParameters` error with a formatted message.
    #[must_use]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create a `Timeout` error recording the duration that elapsed.
    #[must_use]
    pub fn timeout(waited: Duration) -> Self {
        Self::Timeout { waited }
    }

    /// Create an `Execution` error wrapping the protected code's failure.
    #[must_use]
    pub fn execution(source: impl Into<ProtectedError>) -> Self {
        Self::Execution {
            source: source.into(),
        }
    }

    /// Whether this error is a [`LockCraftError::Timeout`].
    ///
    /// Convenience for callers that retry on timeout but propagate
    /// everything else.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
