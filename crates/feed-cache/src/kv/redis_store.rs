//! Redis-backed key-value store

use async_trait::async_trait;
use tracing::instrument;

use feed_core::{KeyValueStore, RepoResult};

use crate::pool::RedisPool;

/// Key prefix so cache keys never collide with other data in the same Redis
const KEY_PREFIX: &str = "feed:cache:";

/// Key-value store on plain Redis strings
#[derive(Clone, Debug)]
pub struct RedisKeyValueStore {
    pool: RedisPool,
}

impl RedisKeyValueStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.pool.get_raw(&Self::key(key)).await?)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String) -> RepoResult<()> {
        self.pool.set_raw(&Self::key(key), &value).await?;
        Ok(())
    }
}
