//! `LockStore` implementation over Redis primitives.

use std::time::Duration;

use fred::prelude::*;
use fred::types::{CustomCommand, Scanner};
use futures::TryStreamExt;
use tracing::instrument;

use task_lock_core::error::{LockError, LockResult};
use task_lock_core::store::LockStore;

use crate::provider::RedisLockStore;

/// Atomically adds to a key's remaining TTL.
///
/// PTTL returns -2 for a missing key and -1 for a key without expiry;
/// adding to an unbounded lock keeps it unbounded.
const EXTEND_ADD_SCRIPT: &str = r#"
    local ttl = redis.call('pttl', KEYS[1])
    if ttl == -2 then return 0 end
    if ttl == -1 then return 1 end
    return redis.call('pexpire', KEYS[1], ttl + tonumber(ARGV[1]))
"#;

/// Replaces a key's TTL outright if the key exists.
const EXTEND_REPLACE_SCRIPT: &str = r#"
    if redis.call('exists', KEYS[1]) == 0 then return 0 end
    return redis.call('pexpire', KEYS[1], ARGV[1])
"#;

/// Acquires the key if free, otherwise refreshes its TTL without touching
/// the stored owner.
const REACQUIRE_PX_SCRIPT: &str = r#"
    if redis.call('set', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2]) then return 1 end
    redis.call('pexpire', KEYS[1], ARGV[2])
    return 1
"#;

/// Reacquire variant for locks without expiry: a held key's TTL is removed.
const REACQUIRE_PERSIST_SCRIPT: &str = r#"
    if redis.call('set', KEYS[1], ARGV[1], 'NX') then return 1 end
    redis.call('persist', KEYS[1])
    return 1
"#;

fn unavailable(op: &str, error: RedisError) -> LockError {
    LockError::Unavailable(Box::new(std::io::Error::other(format!(
        "Redis {op} failed: {error}"
    ))))
}

/// Escapes glob metacharacters so a prefix matches literally in SCAN MATCH.
fn escape_match_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl RedisLockStore {
    async fn eval(&self, script: &'static str, token: &str, args: &[RedisValue]) -> LockResult<i64> {
        let mut cmd_args: Vec<RedisValue> = vec![script.into(), 1_i64.into(), token.into()];
        cmd_args.extend_from_slice(args);
        let cmd = CustomCommand::new_static("EVAL", None, false);
        self.client
            .custom(cmd, cmd_args)
            .await
            .map_err(|e| unavailable("EVAL", e))
    }
}

impl LockStore for RedisLockStore {
    async fn acquire(&self, token: &str, owner_id: &str, ttl: Option<Duration>) -> LockResult<bool> {
        let expiration = ttl.map(|ttl| Expiration::PX(ttl.as_millis() as i64));

        // SET NX is a single atomic create-if-absent; no read precedes it.
        let result: Option<String> = self
            .client
            .set(token, owner_id, expiration, Some(SetOptions::NX), false)
            .await
            .map_err(|e| unavailable("SET NX", e))?;

        Ok(result.is_some())
    }

    async fn release(&self, token: &str) -> LockResult<bool> {
        let removed: i64 = self
            .client
            .del(token)
            .await
            .map_err(|e| unavailable("DEL", e))?;
        Ok(removed > 0)
    }

    async fn reacquire(&self, token: &str, owner_id: &str, ttl: Option<Duration>) -> LockResult<bool> {
        let result = match ttl {
            Some(ttl) => {
                let args: Vec<RedisValue> =
                    vec![owner_id.into(), (ttl.as_millis() as i64).into()];
                self.eval(REACQUIRE_PX_SCRIPT, token, &args).await?
            }
            None => {
                let args: Vec<RedisValue> = vec![owner_id.into()];
                self.eval(REACQUIRE_PERSIST_SCRIPT, token, &args).await?
            }
        };
        Ok(result == 1)
    }

    async fn extend(&self, token: &str, additional_ttl: Duration, replace_ttl: bool) -> LockResult<bool> {
        let millis = additional_ttl.as_millis() as i64;
        let args: Vec<RedisValue> = vec![millis.into()];
        let script = if replace_ttl {
            EXTEND_REPLACE_SCRIPT
        } else {
            EXTEND_ADD_SCRIPT
        };
        let result = self.eval(script, token, &args).await?;
        Ok(result == 1)
    }

    async fn owner_id_of(&self, token: &str) -> LockResult<Option<String>> {
        self.client
            .get(token)
            .await
            .map_err(|e| unavailable("GET", e))
    }

    async fn remaining_ttl(&self, token: &str) -> LockResult<Duration> {
        let ttl: i64 = self
            .client
            .pttl(token)
            .await
            .map_err(|e| unavailable("PTTL", e))?;
        Ok(match ttl {
            -2 => Duration::ZERO,
            -1 => Duration::MAX,
            millis => Duration::from_millis(millis.max(0) as u64),
        })
    }

    async fn is_locked(&self, token: &str) -> LockResult<bool> {
        let exists: i64 = self
            .client
            .exists(token)
            .await
            .map_err(|e| unavailable("EXISTS", e))?;
        Ok(exists > 0)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn clear(&self, prefix: &str) -> LockResult<u64> {
        let pattern = format!("{}*", escape_match_pattern(prefix));
        let mut removed = 0u64;
        let mut scan = self.client.scan(pattern, Some(100), None);

        while let Some(mut page) = scan
            .try_next()
            .await
            .map_err(|e| unavailable("SCAN", e))?
        {
            if let Some(keys) = page.take_results() {
                if !keys.is_empty() {
                    let deleted: i64 = self
                        .client
                        .del(keys)
                        .await
                        .map_err(|e| unavailable("DEL", e))?;
                    removed += deleted as u64;
                }
            }
            page.next().map_err(|e| unavailable("SCAN", e))?;
        }

        Ok(removed)
    }
}
