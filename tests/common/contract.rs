//! Contract assertions every `LockStore` backend must satisfy.
//!
//! Written as generic functions so each backend runs the same suite: the
//! in-process store in `store_contract.rs`, Redis in `redis_tests.rs`.

use std::time::Duration;

use task_lock::LockStore;

/// Concurrent acquires with unique owner ids: exactly one wins.
pub async fn exercise_mutual_exclusion<S>(store: S)
where
    S: LockStore + Clone + Send + Sync + 'static,
{
    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .acquire("contended", &format!("owner-{i}"), None)
                .await
                .unwrap()
        }));
    }

    let mut wins = 0;
    for task in tasks {
        if task.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
    assert!(store.is_locked("contended").await.unwrap());
    store.release("contended").await.unwrap();
}

/// A lock with ttl=T is held just before T and free just after.
pub async fn exercise_expiry<S: LockStore>(store: &S) {
    assert!(store
        .acquire("expiring", "a", Some(Duration::from_millis(300)))
        .await
        .unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!store.acquire("expiring", "b", None).await.unwrap());
    assert!(store.is_locked("expiring").await.unwrap());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!store.is_locked("expiring").await.unwrap());
    assert!(store.acquire("expiring", "b", None).await.unwrap());
    assert_eq!(store.owner_id_of("expiring").await.unwrap().as_deref(), Some("b"));
    store.release("expiring").await.unwrap();
}

/// Releasing a free token reports "nothing removed", never an error.
pub async fn exercise_idempotent_release<S: LockStore>(store: &S) {
    assert!(!store.release("never-held").await.unwrap());
    assert!(store.acquire("held-once", "a", None).await.unwrap());
    assert!(store.release("held-once").await.unwrap());
    assert!(!store.release("held-once").await.unwrap());
}

/// Reacquire acquires when free and refreshes (never hijacks) when held.
pub async fn exercise_reacquire<S: LockStore>(store: &S) {
    // Free token: identical to acquire.
    assert!(store
        .reacquire("reclaim", "a", Some(Duration::from_secs(10)))
        .await
        .unwrap());
    assert_eq!(store.owner_id_of("reclaim").await.unwrap().as_deref(), Some("a"));

    // Held token, different caller: the TTL refreshes but the stored owner
    // stays the original acquirer's.
    assert!(store
        .reacquire("reclaim", "b", Some(Duration::from_secs(30)))
        .await
        .unwrap());
    assert_eq!(store.owner_id_of("reclaim").await.unwrap().as_deref(), Some("a"));
    let remaining = store.remaining_ttl("reclaim").await.unwrap();
    assert!(remaining > Duration::from_secs(10));
    store.release("reclaim").await.unwrap();
}

/// Additive extend adds to the remaining TTL; replace resets it outright.
pub async fn exercise_extend<S: LockStore>(store: &S) {
    store
        .acquire("extending", "a", Some(Duration::from_secs(10)))
        .await
        .unwrap();

    assert!(store
        .extend("extending", Duration::from_secs(30), false)
        .await
        .unwrap());
    let after_add = store.remaining_ttl("extending").await.unwrap();
    assert!(after_add > Duration::from_secs(38) && after_add <= Duration::from_secs(40));

    assert!(store
        .extend("extending", Duration::from_secs(30), true)
        .await
        .unwrap());
    let after_replace = store.remaining_ttl("extending").await.unwrap();
    assert!(after_replace <= Duration::from_secs(30));
    assert!(after_replace > Duration::from_secs(28));

    store.release("extending").await.unwrap();

    // Absent token: nothing to extend.
    assert!(!store
        .extend("extending", Duration::from_secs(30), false)
        .await
        .unwrap());
}

/// Prefix clear removes matching tokens and leaves the rest untouched.
pub async fn exercise_clear<S: LockStore>(store: &S) {
    store.acquire("proj:42:train", "a", None).await.unwrap();
    store.acquire("proj:42:export", "a", None).await.unwrap();
    store.acquire("proj:7:train", "a", None).await.unwrap();

    assert_eq!(store.clear("proj:42:").await.unwrap(), 2);
    assert!(!store.is_locked("proj:42:train").await.unwrap());
    assert!(!store.is_locked("proj:42:export").await.unwrap());
    assert!(store.is_locked("proj:7:train").await.unwrap());

    store.clear("proj:").await.unwrap();
}

/// The pinned `job:7` scenario: after A's lock lapses and B acquires, A's
/// late extend refreshes B's entry without changing the reported owner.
pub async fn exercise_stale_holder_extend<S: LockStore>(store: &S) {
    assert!(store
        .acquire("job:7", "worker-a", Some(Duration::from_millis(200)))
        .await
        .unwrap());
    assert!(!store.acquire("job:7", "worker-b", None).await.unwrap());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(store
        .acquire("job:7", "worker-b", Some(Duration::from_secs(10)))
        .await
        .unwrap());

    // A still believes it owns job:7. Its extend succeeds at the store
    // level (ownership-unchecked) but only refreshes B's TTL.
    assert!(store
        .extend("job:7", Duration::from_secs(20), false)
        .await
        .unwrap());
    assert_eq!(
        store.owner_id_of("job:7").await.unwrap().as_deref(),
        Some("worker-b")
    );
    assert!(store.remaining_ttl("job:7").await.unwrap() > Duration::from_secs(10));
    store.release("job:7").await.unwrap();
}
