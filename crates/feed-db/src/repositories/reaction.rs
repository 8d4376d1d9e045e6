//! PostgreSQL implementation of ReactionRepository
//!
//! `posts.reaction_count` is maintained in the same transaction as the
//! reaction row, so the stored count always equals the number of rows.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::instrument;

use feed_core::entities::Reaction;
use feed_core::traits::{ReactionRepository, RepoResult};
use feed_core::value_objects::{PostId, UserId};

use crate::mappers::{count_from_db, ReactionInsert};

use super::error::{map_db_error, map_reaction_insert_error, post_not_found};

/// PostgreSQL implementation of ReactionRepository
#[derive(Clone)]
pub struct PgReactionRepository {
    pool: PgPool,
}

impl PgReactionRepository {
    /// Create a new PgReactionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReactionRepository for PgReactionRepository {
    #[instrument(skip(self))]
    async fn find_post_ids_by_user(&self, user_id: &UserId) -> RepoResult<HashSet<PostId>> {
        let results = sqlx::query_scalar::<_, String>(
            r#"
            SELECT post_id
            FROM reactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(PostId::new).collect())
    }

    #[instrument(skip(self, reaction), fields(post_id = %reaction.post_id, user_id = %reaction.user_id))]
    async fn create(&self, reaction: &Reaction) -> RepoResult<u32> {
        let insert = ReactionInsert::new(reaction);
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query(
            r#"
            INSERT INTO reactions (post_id, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(insert.post_id)
        .bind(insert.user_id)
        .bind(insert.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_reaction_insert_error(e, &reaction.post_id))?;

        let count = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE posts SET reaction_count = reaction_count + 1
            WHERE id = $1
            RETURNING reaction_count
            "#,
        )
        .bind(insert.post_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| post_not_found(&reaction.post_id))?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(count_from_db(count))
    }

    #[instrument(skip(self))]
    async fn delete(&self, post_id: &PostId, user_id: &UserId) -> RepoResult<u32> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let removed = sqlx::query(
            r#"
            DELETE FROM reactions WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id.as_str())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();

        let query = if removed > 0 {
            r#"
            UPDATE posts SET reaction_count = GREATEST(reaction_count - 1, 0)
            WHERE id = $1
            RETURNING reaction_count
            "#
        } else {
            r#"
            SELECT reaction_count FROM posts WHERE id = $1
            "#
        };

        let count = sqlx::query_scalar::<_, i32>(query)
            .bind(post_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| post_not_found(post_id))?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(count_from_db(count))
    }
}
