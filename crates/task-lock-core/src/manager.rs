//! The lock coordination protocol layered on a [`LockStore`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::watch;
use tracing::{instrument, Span};

use crate::backoff::RetrySchedule;
use crate::config::LockManagerBuilder;
use crate::error::{LockError, LockResult};
use crate::store::{validate_token, LockStore};

/// Generates a unique owner id.
///
/// Format: `{process_id}_{counter}_{random}`.
pub(crate) fn generate_owner_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let random: u64 = rand::thread_rng().gen();
    format!("{pid}_{counter}_{random:016x}")
}

/// Outcome of a [`LockManager::run_exclusive`] call.
///
/// A concurrent run already in progress is an expected condition, so the
/// losing caller gets `Skipped` back as a success, not an error.
#[derive(Debug)]
pub enum RunOutcome<T> {
    /// This caller won the lock and the work ran to completion.
    Completed(T),
    /// Another holder already claimed the work; nothing ran.
    Skipped,
}

impl<T> RunOutcome<T> {
    /// Returns `true` if the work ran.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns `true` if the work was skipped as a duplicate.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Returns the completed value, or `None` if skipped.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped => None,
        }
    }

    /// Converts `Skipped` into [`LockError::DuplicateWork`] for callers that
    /// need to distinguish "skipped because duplicate" as an error value.
    pub fn or_duplicate_err(self, token: &str) -> LockResult<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Skipped => Err(LockError::DuplicateWork(token.to_string())),
        }
    }
}

/// Coordinates task-deduplication locks over a shared store.
///
/// The manager holds no authoritative state of its own; every mutation goes
/// through the store's atomic primitives. Managers are cheap to clone-like
/// share behind an `Arc`, or construct one per worker.
///
/// # Example
///
/// ```rust,ignore
/// let manager = LockManagerBuilder::new()
///     .key_prefix("reports:")
///     .build(store);
///
/// let guard = manager.acquire("project:42:riskiness-train", None).await?;
/// train_model().await?;
/// guard.release().await?;
/// ```
pub struct LockManager<S: LockStore> {
    store: Arc<S>,
    key_prefix: String,
    default_ttl: Option<Duration>,
    max_attempts: u32,
    schedule: RetrySchedule,
    owner_id: String,
}

impl<S: LockStore + 'static> LockManager<S> {
    /// Creates a manager with default configuration.
    ///
    /// Use [`LockManagerBuilder`] to configure one.
    pub fn new(store: S) -> Self {
        LockManagerBuilder::new().build(store)
    }

    pub(crate) fn from_parts(
        store: S,
        key_prefix: String,
        default_ttl: Option<Duration>,
        max_attempts: u32,
        schedule: RetrySchedule,
        owner_id: Option<String>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            key_prefix,
            default_ttl,
            max_attempts,
            schedule,
            owner_id: owner_id.unwrap_or_else(generate_owner_id),
        }
    }

    /// Returns this manager's owner id.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Returns the configured key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn qualified(&self, token: &str) -> LockResult<String> {
        validate_token(token)?;
        Ok(format!("{}{}", self.key_prefix, token))
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl)
    }

    fn guard(&self, token: &str, key: String, ttl: Option<Duration>) -> LockGuard<S> {
        let (lost_tx, lost_rx) = watch::channel(false);
        LockGuard {
            store: self.store.clone(),
            token: token.to_string(),
            key,
            owner_id: self.owner_id.clone(),
            ttl,
            lost_tx: Some(lost_tx),
            lost_rx,
            renewal_task: None,
            released: false,
        }
    }

    /// Attempts to acquire the lock without waiting.
    ///
    /// Returns `Ok(None)` when the lock is held by another owner. A `ttl`
    /// of `None` falls back to the manager's default TTL.
    #[instrument(skip(self), fields(lock.token = %token, acquired = tracing::field::Empty))]
    pub async fn try_acquire(
        &self,
        token: &str,
        ttl: Option<Duration>,
    ) -> LockResult<Option<LockGuard<S>>> {
        let key = self.qualified(token)?;
        let ttl = self.effective_ttl(ttl);
        if self.store.acquire(&key, &self.owner_id, ttl).await? {
            Span::current().record("acquired", true);
            Ok(Some(self.guard(token, key, ttl)))
        } else {
            Span::current().record("acquired", false);
            Ok(None)
        }
    }

    /// Acquires the lock, retrying with jittered backoff up to the
    /// configured attempt ceiling.
    ///
    /// Fails with [`LockError::AcquireTimeout`] once every attempt found the
    /// lock held. There is no fairness across waiters: any contender may win
    /// a given retry round. Dropping the returned future between attempts
    /// leaves no partial acquisition behind.
    #[instrument(skip(self), fields(
        lock.token = %token,
        acquired = tracing::field::Empty,
        attempts = tracing::field::Empty,
        elapsed_ms = tracing::field::Empty,
    ))]
    pub async fn acquire(&self, token: &str, ttl: Option<Duration>) -> LockResult<LockGuard<S>> {
        let key = self.qualified(token)?;
        let ttl = self.effective_ttl(ttl);
        let start = Instant::now();

        for attempt in 0..self.max_attempts {
            if self.store.acquire(&key, &self.owner_id, ttl).await? {
                Span::current().record("acquired", true);
                Span::current().record("attempts", attempt + 1);
                Span::current().record("elapsed_ms", start.elapsed().as_millis() as u64);
                return Ok(self.guard(token, key, ttl));
            }
            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.schedule.delay(attempt)).await;
            }
        }

        Span::current().record("acquired", false);
        Span::current().record("attempts", self.max_attempts);
        Err(LockError::AcquireTimeout {
            token: token.to_string(),
            attempts: self.max_attempts,
            waited: start.elapsed(),
        })
    }

    /// Reclaims the lock regardless of whether this process already held it.
    ///
    /// Acquires the token if free; refreshes its TTL if held, without
    /// replacing the stored owner. Intended for a worker recovering after a
    /// crash or restart that may still own the logical slot.
    #[instrument(skip(self), fields(lock.token = %token))]
    pub async fn reacquire(&self, token: &str, ttl: Option<Duration>) -> LockResult<LockGuard<S>> {
        let key = self.qualified(token)?;
        let ttl = self.effective_ttl(ttl);
        self.store.reacquire(&key, &self.owner_id, ttl).await?;
        Ok(self.guard(token, key, ttl))
    }

    /// Runs `work` only if no other holder currently claims `token`.
    ///
    /// Non-blocking single-run guard for scheduled and periodic jobs: the
    /// lock is taken with `ttl = timeout`, so a crashed winner frees the slot
    /// once the timeout lapses. A losing caller returns
    /// [`RunOutcome::Skipped`] immediately. The lock is released on every
    /// exit path; if `work` fails, the failure surfaces as
    /// [`LockError::Execution`] after release, with any release failure
    /// chained alongside rather than masking it.
    #[instrument(skip(self, work), fields(lock.token = %token, outcome = tracing::field::Empty))]
    pub async fn run_exclusive<F, Fut, T, E>(
        &self,
        token: &str,
        timeout: Duration,
        work: F,
    ) -> LockResult<RunOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(guard) = self.try_acquire(token, Some(timeout)).await? else {
            Span::current().record("outcome", "skipped");
            tracing::debug!(lock.token = %token, "already running elsewhere, skipping");
            return Ok(RunOutcome::Skipped);
        };

        // If the caller is cancelled mid-work, the guard's drop still
        // releases the lock.
        let result = work().await;
        let released = guard.release().await;

        match result {
            Ok(value) => {
                if let Err(error) = released {
                    tracing::warn!(lock.token = %token, %error, "release failed after completed run");
                    return Err(error);
                }
                Span::current().record("outcome", "completed");
                Ok(RunOutcome::Completed(value))
            }
            Err(source) => {
                Span::current().record("outcome", "failed");
                let release_error = match released {
                    Ok(_) => None,
                    Err(error) => {
                        tracing::warn!(lock.token = %token, %error, "release failed after failing run");
                        Some(Box::new(error))
                    }
                };
                Err(LockError::Execution {
                    source: source.into(),
                    release_error,
                })
            }
        }
    }

    /// Reads the current holder of `token`, or `None` if free.
    pub async fn owner_id_of(&self, token: &str) -> LockResult<Option<String>> {
        let key = self.qualified(token)?;
        self.store.owner_id_of(&key).await
    }

    /// Existence check for `token`.
    pub async fn is_locked(&self, token: &str) -> LockResult<bool> {
        let key = self.qualified(token)?;
        self.store.is_locked(&key).await
    }

    /// Reads the remaining TTL of `token`.
    pub async fn remaining_ttl(&self, token: &str) -> LockResult<Duration> {
        let key = self.qualified(token)?;
        self.store.remaining_ttl(&key).await
    }

    /// Removes every lock whose token starts with `prefix` (after the
    /// manager's key prefix). Operational sweep, not a hot-path operation.
    pub async fn clear(&self, prefix: &str) -> LockResult<u64> {
        self.store
            .clear(&format!("{}{}", self.key_prefix, prefix))
            .await
    }
}

/// Scoped acquisition: a held lock with guaranteed release.
///
/// Call [`release`](LockGuard::release) explicitly for error handling; a
/// guard dropped without it (normal return, panic unwind, or future
/// cancellation) spawns a best-effort background release, with the store TTL
/// as the backstop.
pub struct LockGuard<S: LockStore + 'static> {
    store: Arc<S>,
    token: String,
    key: String,
    owner_id: String,
    ttl: Option<Duration>,
    lost_tx: Option<watch::Sender<bool>>,
    lost_rx: watch::Receiver<bool>,
    renewal_task: Option<tokio::task::JoinHandle<()>>,
    released: bool,
}

impl<S: LockStore + 'static> LockGuard<S> {
    /// The caller-visible token this guard holds.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The owner id recorded in the store for this acquisition.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Returns a receiver that flips to `true` if background renewal loses
    /// the lock. Without [`keep_alive`](LockGuard::keep_alive) it never
    /// changes.
    pub fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_rx
    }

    /// Extends this lock's TTL.
    ///
    /// Additive unless `replace_ttl` is set; see [`LockStore::extend`].
    pub async fn extend(&self, additional_ttl: Duration, replace_ttl: bool) -> LockResult<bool> {
        self.store.extend(&self.key, additional_ttl, replace_ttl).await
    }

    /// Spawns a background task renewing the TTL every `cadence`.
    ///
    /// Each renewal resets the TTL to the acquisition TTL, so a live holder
    /// keeps the lock across TTL windows while a dead holder's lock lapses.
    /// When a renewal finds the token gone (or the store unreachable) the
    /// [`lost_token`](LockGuard::lost_token) signal flips and renewal stops.
    /// No-op for locks acquired without a TTL, and at most one renewal task
    /// runs per guard.
    pub fn keep_alive(&mut self, cadence: Duration) {
        let Some(ttl) = self.ttl else { return };
        let Some(lost_tx) = self.lost_tx.take() else { return };
        let store = self.store.clone();
        let key = self.key.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if lost_tx.is_closed() {
                    break;
                }
                match store.extend(&key, ttl, true).await {
                    Ok(true) => {}
                    Ok(false) => {
                        let _ = lost_tx.send(true);
                        break;
                    }
                    Err(error) => {
                        tracing::warn!(lock.token = %key, %error, "ttl renewal failed");
                        let _ = lost_tx.send(true);
                        break;
                    }
                }
            }
        });
        self.renewal_task = Some(task);
    }

    /// Explicitly releases the lock.
    ///
    /// Returns `true` iff the store still held an entry for the token.
    /// Prefer this over drop when release errors matter.
    pub async fn release(mut self) -> LockResult<bool> {
        if let Some(task) = self.renewal_task.take() {
            task.abort();
        }
        // Marked released only once the store call finishes: if this future
        // is cancelled mid-await (or the call fails), the drop backstop
        // retries. Store release is idempotent, so a double release is safe.
        let result = self.store.release(&self.key).await;
        self.released = result.is_ok();
        result
    }
}

impl<S: LockStore + 'static> std::fmt::Debug for LockGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("token", &self.token)
            .field("key", &self.key)
            .field("owner_id", &self.owner_id)
            .field("ttl", &self.ttl)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<S: LockStore + 'static> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if let Some(task) = self.renewal_task.take() {
            task.abort();
        }
        if self.released {
            return;
        }
        // Async release is impossible here; spawn it when a runtime is
        // available, otherwise the store TTL is the backstop.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = self.store.clone();
            let key = std::mem::take(&mut self.key);
            handle.spawn(async move {
                if let Err(error) = store.release(&key).await {
                    tracing::warn!(lock.token = %key, %error, "failed to release lock on drop");
                }
            });
        }
    }
}
