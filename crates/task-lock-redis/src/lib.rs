//! Redis lock store.
//!
//! Implements the [`LockStore`](task_lock_core::store::LockStore) contract
//! over a shared Redis server using native atomic primitives: `SET NX PX`
//! for acquisition, `DEL` for release, `PTTL`/`GET` for reads, Lua scripts
//! for the operations Redis has no single command for (additive extend,
//! acquire-or-refresh), and `SCAN` for the prefix sweep.

pub mod provider;
pub mod store;

pub use provider::{RedisLockStoreBuilder, RedisLockStore};
