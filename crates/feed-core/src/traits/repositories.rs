//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs from the authoritative store and
//! the infrastructure layer provides the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::entities::{Post, Reaction};
use crate::error::DomainError;
use crate::value_objects::{PostId, UserId};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Post Repository
// ============================================================================

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// List posts still live at `now`, newest first
    async fn find_live(&self, now: DateTime<Utc>) -> RepoResult<Vec<Post>>;

    /// Find post by ID, expired or not
    async fn find_by_id(&self, id: &PostId) -> RepoResult<Option<Post>>;

    /// Insert a new post
    async fn create(&self, post: &Post) -> RepoResult<()>;
}

// ============================================================================
// Reaction Repository
// ============================================================================

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Ids of every post `user_id` has reacted to
    async fn find_post_ids_by_user(&self, user_id: &UserId) -> RepoResult<HashSet<PostId>>;

    /// Add a reaction and return the post's new reaction count
    ///
    /// Fails with [`DomainError::DuplicateReaction`] when the pair already
    /// exists and [`DomainError::PostNotFound`] when the post does not.
    async fn create(&self, reaction: &Reaction) -> RepoResult<u32>;

    /// Remove a reaction and return the post's reaction count afterwards
    ///
    /// Removing an absent reaction is not an error.
    async fn delete(&self, post_id: &PostId, user_id: &UserId) -> RepoResult<u32>;
}
