//! Reaction entity - one user's reaction on one post

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{PostId, UserId};

/// Reaction entity
///
/// Identified by `(post_id, user_id)`; a user reacts to a post at most once.
/// Un-reacting deletes the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    /// Create a new Reaction
    pub fn new(post_id: PostId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            post_id,
            user_id,
            created_at: now,
        }
    }

    /// Check if this reaction belongs to `user_id`
    #[inline]
    pub fn is_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}
