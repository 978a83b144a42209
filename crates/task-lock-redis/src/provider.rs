//! Redis lock store construction.

use fred::prelude::*;

use task_lock_core::error::{LockError, LockResult};

/// Builder for [`RedisLockStore`] configuration.
pub struct RedisLockStoreBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
}

impl RedisLockStoreBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            url: None,
            client: None,
        }
    }

    /// Sets the Redis server URL to connect to.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing connected Redis client.
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the store, connecting if a URL was given.
    pub async fn build(self) -> LockResult<RedisLockStore> {
        if let Some(client) = self.client {
            return Ok(RedisLockStore { client });
        }

        let url = self.url.ok_or_else(|| {
            LockError::Unavailable(Box::new(std::io::Error::other(
                "no Redis client or URL provided",
            )))
        })?;

        let config = RedisConfig::from_url(&url).map_err(|e| {
            LockError::Unavailable(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid Redis URL: {e}"),
            )))
        })?;

        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client.wait_for_connect().await.map_err(|e| {
            LockError::Unavailable(Box::new(std::io::Error::other(format!(
                "failed to connect to Redis: {e}"
            ))))
        })?;

        Ok(RedisLockStore { client })
    }
}

impl Default for RedisLockStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// [`LockStore`](task_lock_core::store::LockStore) over a shared Redis server.
///
/// Expiry is enforced by Redis itself, so the absence check during
/// acquisition and the TTL check are one atomic `SET NX PX`.
#[derive(Clone)]
pub struct RedisLockStore {
    pub(crate) client: RedisClient,
}

impl RedisLockStore {
    /// Returns a new builder for configuring the store.
    pub fn builder() -> RedisLockStoreBuilder {
        RedisLockStoreBuilder::new()
    }

    /// Creates a store connected to the given Redis URL.
    pub async fn new(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }
}
