//! Schema setup
//!
//! The statements are idempotent, so this runs on every startup.

use sqlx::PgPool;
use tracing::info;

const INIT_SQL: &str = include_str!("../migrations/0001_posts_and_reactions.sql");

/// Create the posts and reactions tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(INIT_SQL).execute(pool).await?;
    info!("Database schema ready");
    Ok(())
}
