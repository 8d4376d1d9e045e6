//! PostgreSQL connection pool
//!
//! The client keeps few connections and gives up quickly when the database
//! is unreachable, so a dead backend surfaces as an error instead of a hang.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use feed_common::DatabaseConfig;

/// Name reported to the server in `pg_stat_activity`
pub const APPLICATION_NAME: &str = "ephemeral-feed";

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl PoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        let max_connections = config.max_connections.max(1);
        Self {
            max_connections,
            min_connections: config.min_connections.min(max_connections),
            ..Self::new(config.url.clone())
        }
    }
}

/// Open the pool and check one connection
pub async fn create_pool(config: &PoolConfig) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(&config.url)?.application_name(APPLICATION_NAME);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await?;

    ping(&pool).await?;
    tracing::info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

/// Round-trip a trivial query
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
