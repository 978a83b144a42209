//! Core contract and coordination protocol for task-deduplication locks.
//!
//! Background jobs on independent worker processes may be handed
//! logically-identical work. The [`LockStore`](store::LockStore) trait
//! defines the atomic, TTL-aware primitives a shared store must provide, and
//! [`LockManager`](manager::LockManager) layers the coordination protocol on
//! top: blocking acquisition with jittered backoff, scoped guards with
//! guaranteed release, TTL renewal for long-lived holders, and a single-run
//! guard for scheduled jobs.

pub mod backoff;
pub mod config;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod store;

pub use error::{LockError, LockResult};
pub use prelude::*;
