//! Distributed task-deduplication locks with pluggable store backends.
//!
//! Worker pools polling a shared queue may be handed logically-identical
//! work (same project, same commit range, same model). This crate guarantees
//! at most one worker executes a given logical unit at a time, survives
//! worker crashes via store-enforced TTL expiry, and lets long-running
//! holders renew ownership without racing a waiter that believes the lock
//! has lapsed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use task_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Production workers share a Redis store.
//!     let store = RedisLockStore::new("redis://localhost:6379").await?;
//!
//!     let manager = LockManagerBuilder::new()
//!         .key_prefix("ci-prod:")
//!         .default_ttl(Duration::from_secs(300))
//!         .build(store);
//!
//!     // Scoped acquisition with retry/backoff.
//!     let guard = manager.acquire("project:42:riskiness-train", None).await?;
//!     println!("training...");
//!     guard.release().await?;
//!
//!     // Single-run guard for a scheduled job: the loser skips, no error.
//!     let outcome = manager
//!         .run_exclusive("nightly-report", Duration::from_secs(600), || async {
//!             Ok::<_, std::io::Error>(())
//!         })
//!         .await?;
//!     if outcome.is_skipped() {
//!         println!("nightly report already running elsewhere");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! Any type implementing [`LockStore`] plugs into the same [`LockManager`]:
//!
//! - [`MemoryLockStore`]: in-process map with deadline expiry, for tests
//!   and single-process runs.
//! - [`RedisLockStore`]: shared Redis server with native atomic operations
//!   and TTL support, for worker pools.
//!
//! # Crate Organization
//!
//! This is a meta-crate re-exporting:
//! - `task-lock-core`: the `LockStore` contract and coordination protocol
//! - `task-lock-memory`: in-process reference backend
//! - `task-lock-redis`: Redis backend

pub use task_lock_core::*;

pub use task_lock_memory::MemoryLockStore;

pub use task_lock_redis::{RedisLockStore, RedisLockStoreBuilder};
