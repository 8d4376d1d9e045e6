//! # feed-db
//!
//! Database layer implementing the post and reaction repositories with
//! PostgreSQL via SQLx.
//!
//! ## Overview
//!
//! - Connection pool management
//! - Idempotent schema setup
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feed_db::{create_pool, ensure_schema, PgPostRepository, PoolConfig};
//!
//! async fn example(url: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&PoolConfig::new(url)).await?;
//!     ensure_schema(&pool).await?;
//!     let posts = PgPostRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod schema;

// Re-export commonly used types
pub use pool::{create_pool, PgPool, PoolConfig};
pub use repositories::{PgPostRepository, PgReactionRepository};
pub use schema::ensure_schema;
