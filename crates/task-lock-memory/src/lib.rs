//! In-process reference lock store.
//!
//! A mutex-guarded map with deadline-based expiry. Not distributed: state is
//! lost on restart and shared only within one process. Intended for tests
//! and single-process deployments; production workers use the Redis store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use task_lock_core::error::{LockError, LockResult};
use task_lock_core::store::LockStore;

#[derive(Debug, Clone)]
struct Entry {
    owner_id: String,
    /// `None` means no automatic expiry.
    deadline: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process [`LockStore`] backed by a `HashMap`.
///
/// Expiry is enforced atomically with each access: an expired entry is
/// indistinguishable from a free one. Expired entries linger in the map
/// until the next operation touches them.
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryLockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> LockResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| LockError::Unavailable(Box::new(std::io::Error::other("lock table poisoned"))))
    }
}

impl LockStore for MemoryLockStore {
    async fn acquire(&self, token: &str, owner_id: &str, ttl: Option<Duration>) -> LockResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        if let Some(existing) = entries.get(token) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        entries.insert(
            token.to_string(),
            Entry {
                owner_id: owner_id.to_string(),
                deadline: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
        Ok(true)
    }

    async fn release(&self, token: &str) -> LockResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        match entries.remove(token) {
            Some(entry) => Ok(!entry.is_expired(now)),
            None => Ok(false),
        }
    }

    async fn reacquire(&self, token: &str, owner_id: &str, ttl: Option<Duration>) -> LockResult<bool> {
        let now = Instant::now();
        let deadline = ttl.and_then(|ttl| now.checked_add(ttl));
        let mut entries = self.entries()?;
        match entries.get_mut(token) {
            Some(existing) if !existing.is_expired(now) => {
                // Held: refresh the expiry, keep the stored owner.
                existing.deadline = deadline;
            }
            _ => {
                entries.insert(
                    token.to_string(),
                    Entry {
                        owner_id: owner_id.to_string(),
                        deadline,
                    },
                );
            }
        }
        Ok(true)
    }

    async fn extend(&self, token: &str, additional_ttl: Duration, replace_ttl: bool) -> LockResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        let Some(entry) = entries.get_mut(token) else {
            return Ok(false);
        };
        if entry.is_expired(now) {
            entries.remove(token);
            return Ok(false);
        }
        if replace_ttl {
            entry.deadline = now.checked_add(additional_ttl);
        } else if let Some(deadline) = entry.deadline {
            // Adding to an unbounded lock keeps it unbounded.
            entry.deadline = deadline.checked_add(additional_ttl);
        }
        Ok(true)
    }

    async fn owner_id_of(&self, token: &str) -> LockResult<Option<String>> {
        let now = Instant::now();
        let entries = self.entries()?;
        Ok(entries
            .get(token)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.owner_id.clone()))
    }

    async fn remaining_ttl(&self, token: &str) -> LockResult<Duration> {
        let now = Instant::now();
        let entries = self.entries()?;
        Ok(match entries.get(token) {
            Some(entry) if !entry.is_expired(now) => entry
                .deadline
                .map_or(Duration::MAX, |deadline| deadline.duration_since(now)),
            _ => Duration::ZERO,
        })
    }

    async fn is_locked(&self, token: &str) -> LockResult<bool> {
        let now = Instant::now();
        let entries = self.entries()?;
        Ok(entries
            .get(token)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn clear(&self, prefix: &str) -> LockResult<u64> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|token, _| !token.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_is_create_if_absent() {
        let store = MemoryLockStore::new();
        assert!(store.acquire("job:1", "a", None).await.unwrap());
        assert!(!store.acquire("job:1", "b", None).await.unwrap());
        assert_eq!(store.owner_id_of("job:1").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn expired_entry_is_free() {
        let store = MemoryLockStore::new();
        assert!(store
            .acquire("job:1", "a", Some(Duration::from_millis(20)))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.is_locked("job:1").await.unwrap());
        assert!(store.acquire("job:1", "b", None).await.unwrap());
        assert_eq!(store.owner_id_of("job:1").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = MemoryLockStore::new();
        assert!(store.acquire("job:1", "a", None).await.unwrap());
        assert!(store.release("job:1").await.unwrap());
        assert!(!store.release("job:1").await.unwrap());
    }

    #[tokio::test]
    async fn reacquire_keeps_stored_owner() {
        let store = MemoryLockStore::new();
        assert!(store
            .acquire("job:1", "a", Some(Duration::from_secs(10)))
            .await
            .unwrap());
        assert!(store
            .reacquire("job:1", "b", Some(Duration::from_secs(30)))
            .await
            .unwrap());
        assert_eq!(store.owner_id_of("job:1").await.unwrap().as_deref(), Some("a"));
        assert!(store.remaining_ttl("job:1").await.unwrap() > Duration::from_secs(10));
    }

    #[tokio::test]
    async fn additive_extend_adds_to_remaining() {
        let store = MemoryLockStore::new();
        store
            .acquire("job:1", "a", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(store
            .extend("job:1", Duration::from_secs(30), false)
            .await
            .unwrap());
        let remaining = store.remaining_ttl("job:1").await.unwrap();
        assert!(remaining > Duration::from_secs(38) && remaining <= Duration::from_secs(40));
    }

    #[tokio::test]
    async fn replace_extend_resets_remaining() {
        let store = MemoryLockStore::new();
        store
            .acquire("job:1", "a", Some(Duration::from_secs(100)))
            .await
            .unwrap();
        assert!(store
            .extend("job:1", Duration::from_secs(30), true)
            .await
            .unwrap());
        let remaining = store.remaining_ttl("job:1").await.unwrap();
        assert!(remaining <= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn extend_on_absent_token_reports_false() {
        let store = MemoryLockStore::new();
        assert!(!store
            .extend("job:1", Duration::from_secs(30), false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unbounded_lock_reports_max_ttl() {
        let store = MemoryLockStore::new();
        store.acquire("job:1", "a", None).await.unwrap();
        assert_eq!(store.remaining_ttl("job:1").await.unwrap(), Duration::MAX);
        // Additive extend of an unbounded lock is a no-op success.
        assert!(store
            .extend("job:1", Duration::from_secs(5), false)
            .await
            .unwrap());
        assert_eq!(store.remaining_ttl("job:1").await.unwrap(), Duration::MAX);
    }

    #[tokio::test]
    async fn clear_removes_only_matching_prefix() {
        let store = MemoryLockStore::new();
        store.acquire("proj:42:a", "a", None).await.unwrap();
        store.acquire("proj:42:b", "a", None).await.unwrap();
        store.acquire("proj:7:a", "a", None).await.unwrap();
        assert_eq!(store.clear("proj:42:").await.unwrap(), 2);
        assert!(!store.is_locked("proj:42:a").await.unwrap());
        assert!(store.is_locked("proj:7:a").await.unwrap());
    }
}
