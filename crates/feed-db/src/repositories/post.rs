//! PostgreSQL implementation of PostRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use feed_core::entities::Post;
use feed_core::error::DomainError;
use feed_core::traits::{PostRepository, RepoResult};
use feed_core::value_objects::PostId;

use crate::mappers::PostInsert;
use crate::models::PostModel;

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of PostRepository
#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    /// Create a new PgPostRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    #[instrument(skip(self))]
    async fn find_live(&self, now: DateTime<Utc>) -> RepoResult<Vec<Post>> {
        let results = sqlx::query_as::<_, PostModel>(
            r#"
            SELECT id, content, created_at, expires_at, user_id, reaction_count
            FROM posts
            WHERE expires_at > $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Post::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &PostId) -> RepoResult<Option<Post>> {
        let result = sqlx::query_as::<_, PostModel>(
            r#"
            SELECT id, content, created_at, expires_at, user_id, reaction_count
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Post::from))
    }

    #[instrument(skip(self, post), fields(post_id = %post.id))]
    async fn create(&self, post: &Post) -> RepoResult<()> {
        let insert = PostInsert::new(post);

        sqlx::query(
            r#"
            INSERT INTO posts (id, content, created_at, expires_at, user_id, reaction_count)
            VALUES ($1, $2, $3, $4, $5, 0)
            "#,
        )
        .bind(insert.id)
        .bind(insert.content)
        .bind(insert.created_at)
        .bind(insert.expires_at)
        .bind(insert.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                DomainError::ValidationError(format!("Post id {} already exists", post.id))
            })
        })?;

        Ok(())
    }
}
