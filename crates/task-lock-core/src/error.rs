//! Error types for lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The backing store could not be reached or answered inconclusively.
    ///
    /// The lock status is unknown: callers must not assume the lock was
    /// either acquired or free.
    #[error("lock store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Every acquisition attempt found the lock held by another owner.
    #[error("failed to acquire lock '{token}' after {attempts} attempts ({waited:?})")]
    AcquireTimeout {
        /// The token that could not be acquired.
        token: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Total time spent attempting and waiting.
        waited: Duration,
    },

    /// The token is malformed (empty, or contains whitespace).
    #[error("invalid lock token: {0}")]
    InvalidToken(String),

    /// The logical unit of work is already claimed by another holder.
    ///
    /// This is an expected-path signal for deduplicated work, not a fault.
    #[error("work for '{0}' is already claimed by another holder")]
    DuplicateWork(String),

    /// The guarded critical section itself failed.
    ///
    /// The lock release still ran; if that release also failed, the release
    /// error is chained here rather than masking the original fault.
    #[error("critical section failed: {source}")]
    Execution {
        /// The error raised by the unit of work.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// Error from the cleanup release, if it also failed.
        release_error: Option<Box<LockError>>,
    },
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
