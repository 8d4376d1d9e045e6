//! Database connection pool management

mod postgres;

pub use postgres::{create_pool, ping, PoolConfig, APPLICATION_NAME};

// Re-export PgPool for convenience
pub use sqlx::postgres::PgPool;
