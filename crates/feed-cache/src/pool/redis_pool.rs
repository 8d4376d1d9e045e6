//! Pooled Redis connections shared by the change bus and the Redis cache.

use deadpool_redis::{Config, Connection, Pool, Runtime};
use feed_common::RedisConfig;
use feed_core::DomainError;
use redis::AsyncCommands;

/// Errors talking to Redis through the pool
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("invalid Redis pool settings: {0}")]
    Build(String),

    #[error("no Redis connection available: {0}")]
    Checkout(#[from] deadpool_redis::PoolError),

    #[error("Redis command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("change could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<RedisPoolError> for DomainError {
    fn from(e: RedisPoolError) -> Self {
        match e {
            RedisPoolError::Encode(e) => DomainError::InternalError(e.to_string()),
            other => DomainError::CacheError(other.to_string()),
        }
    }
}

pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisPool")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

/// Strip credentials from a Redis URL before it is logged
pub(crate) fn redact_url(url: &str) -> &str {
    url.split('@').next_back().unwrap_or(url)
}

impl RedisPool {
    /// Build the pool; no connection is opened until first use
    pub fn from_config(config: &RedisConfig) -> RedisResult<Self> {
        let max_size = config.max_connections.max(1) as usize;
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::Build(e.to_string()))?
            .max_size(max_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::Build(e.to_string()))?;

        tracing::info!(url = %redact_url(&config.url), max_size, "Redis pool ready");
        Ok(Self { pool })
    }

    /// Build the pool and make sure the server answers
    pub async fn connect(config: &RedisConfig) -> RedisResult<Self> {
        let pool = Self::from_config(config)?;
        pool.ping().await?;
        Ok(pool)
    }

    pub async fn get(&self) -> RedisResult<Connection> {
        Ok(self.pool.get().await?)
    }

    /// Round-trip a PING
    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    pub async fn get_raw(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.get().await?;
        Ok(conn.get(key).await?)
    }

    pub async fn set_raw(&self, key: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.get().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}
