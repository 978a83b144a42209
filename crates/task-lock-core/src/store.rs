//! The backend capability contract for lock stores.

use std::future::Future;
use std::time::Duration;

use crate::error::{LockError, LockResult};

/// Atomic, TTL-aware primitives over a shared store.
///
/// All synchronization state lives in the store; implementations of this
/// trait are interchangeable from the protocol layer's perspective. Each
/// operation is all-or-nothing: an indeterminate store response surfaces as
/// [`LockError::Unavailable`], never as a guessed lock state.
///
/// Tokens passed to a store are fully qualified (prefix already applied) and
/// pre-validated by the caller; see [`validate_token`].
///
/// Ownership is deliberately unchecked on `release`, `reacquire` and
/// `extend`: any caller holding the token string may mutate the entry,
/// regardless of which owner created it. Callers that need stale-holder
/// protection must keep their TTLs renewed instead.
///
/// # Example
///
/// ```rust,ignore
/// if store.acquire("project:42:riskiness-train", &owner, Some(ttl)).await? {
///     // we hold the lock
///     do_work().await;
///     store.release("project:42:riskiness-train").await?;
/// }
/// ```
pub trait LockStore: Send + Sync {
    /// Atomically creates the `token -> owner_id` mapping only if absent.
    ///
    /// `ttl` of `None` means no automatic expiry. Returns `true` iff this
    /// call created the mapping. Must be a single atomic store operation,
    /// not a check-then-set pair.
    fn acquire(
        &self,
        token: &str,
        owner_id: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Atomically removes the mapping if present.
    ///
    /// Returns `true` iff something was removed. Releasing an absent token
    /// is not an error.
    fn release(&self, token: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Acquires the token if free; refreshes its TTL outright if held.
    ///
    /// Lets a holder that lost track of its own ownership state (crash and
    /// restart) reclaim the same logical slot without racing. The stored
    /// owner is never replaced when the token is already held. With a `ttl`
    /// of `None`, a held token's expiry is removed.
    fn reacquire(
        &self,
        token: &str,
        owner_id: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Extends the token's TTL.
    ///
    /// With `replace_ttl` false, `additional_ttl` is added to the current
    /// remaining TTL as one atomic store-side operation; adding to a token
    /// with no expiry leaves it unbounded. With `replace_ttl` true the TTL
    /// is replaced outright. Returns `false` if the token is absent or
    /// already expired.
    fn extend(
        &self,
        token: &str,
        additional_ttl: Duration,
        replace_ttl: bool,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Reads the current holder, or `None` if the token is free or expired.
    fn owner_id_of(&self, token: &str)
        -> impl Future<Output = LockResult<Option<String>>> + Send;

    /// Reads the remaining time-to-live.
    ///
    /// Returns `Duration::ZERO` if the token is free or expired, and
    /// `Duration::MAX` if it is held without expiry.
    fn remaining_ttl(&self, token: &str) -> impl Future<Output = LockResult<Duration>> + Send;

    /// Existence check; equivalent to `remaining_ttl(token) > 0`.
    fn is_locked(&self, token: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes every token beginning with `prefix`, returning the count.
    ///
    /// Intended for test teardown or an operational stale-lock sweep. Not
    /// scoped to a single logical lock: it can release unrelated in-flight
    /// holders sharing the prefix, so it must stay off the hot path.
    fn clear(&self, prefix: &str) -> impl Future<Output = LockResult<u64>> + Send;
}

/// Validates a caller-supplied token before it reaches any store.
///
/// Tokens must be non-empty and must not contain whitespace.
pub fn validate_token(token: &str) -> LockResult<()> {
    if token.is_empty() {
        return Err(LockError::InvalidToken("token cannot be empty".to_string()));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(LockError::InvalidToken(format!(
            "token '{token}' contains whitespace"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_tokens() {
        assert!(validate_token("project:42:riskiness-train").is_ok());
        assert!(validate_token("nightly-report").is_ok());
    }

    #[test]
    fn rejects_empty_token() {
        assert!(matches!(
            validate_token(""),
            Err(LockError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_whitespace() {
        assert!(matches!(
            validate_token("job 7"),
            Err(LockError::InvalidToken(_))
        ));
        assert!(matches!(
            validate_token("job\t7"),
            Err(LockError::InvalidToken(_))
        ));
    }
}
