//! Manager configuration.

use std::time::Duration;

use crate::backoff::RetrySchedule;
use crate::manager::LockManager;
use crate::store::LockStore;

/// Builder for [`LockManager`] configuration.
///
/// # Example
///
/// ```rust,ignore
/// let manager = LockManagerBuilder::new()
///     .key_prefix("ci-prod:")
///     .default_ttl(Duration::from_secs(300))
///     .max_attempts(20)
///     .build(store);
/// ```
pub struct LockManagerBuilder {
    key_prefix: String,
    default_ttl: Option<Duration>,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_jitter: Duration,
    owner_id: Option<String>,
}

impl LockManagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            key_prefix: String::new(),
            default_ttl: Some(Duration::from_secs(60)),
            max_attempts: 10,
            backoff_base: Duration::from_millis(100),
            backoff_jitter: Duration::from_millis(100),
            owner_id: None,
        }
    }

    /// Sets the namespace prepended to every token.
    ///
    /// Isolates deployments sharing one store from each other's keys.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the TTL applied when callers omit an explicit one.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Disables the default TTL: locks acquired without an explicit TTL
    /// never expire and must be released explicitly.
    pub fn no_default_ttl(mut self) -> Self {
        self.default_ttl = None;
        self
    }

    /// Sets the retry ceiling for blocking acquisition (minimum 1).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base step of the retry sleep schedule.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Sets the upper bound of the random component added to each retry sleep.
    pub fn backoff_jitter(mut self, jitter: Duration) -> Self {
        self.backoff_jitter = jitter;
        self
    }

    /// Overrides the generated owner id for this manager.
    ///
    /// Useful when the worker already has a stable instance identity.
    pub fn owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Builds a manager over the given store.
    pub fn build<S: LockStore + 'static>(self, store: S) -> LockManager<S> {
        LockManager::from_parts(
            store,
            self.key_prefix,
            self.default_ttl,
            self.max_attempts.max(1),
            RetrySchedule::new(self.backoff_base, self.backoff_jitter),
            self.owner_id,
        )
    }
}

impl Default for LockManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
