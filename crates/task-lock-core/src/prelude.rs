//! Convenience prelude for task-lock types.

pub use crate::config::LockManagerBuilder;
pub use crate::error::{LockError, LockResult};
pub use crate::manager::{LockGuard, LockManager, RunOutcome};
pub use crate::store::LockStore;
