//! Reaction entity -> insert values

use chrono::{DateTime, Utc};

use feed_core::entities::Reaction;

/// Convert Reaction entity reference to values for database insertion
pub struct ReactionInsert<'a> {
    pub post_id: &'a str,
    pub user_id: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> ReactionInsert<'a> {
    pub fn new(reaction: &'a Reaction) -> Self {
        Self {
            post_id: reaction.post_id.as_str(),
            user_id: reaction.user_id.as_str(),
            created_at: reaction.created_at,
        }
    }
}
