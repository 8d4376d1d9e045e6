//! Post entity <-> model mapper

use chrono::{DateTime, Utc};

use feed_core::entities::Post;
use feed_core::value_objects::{PostId, UserId};

use crate::models::PostModel;

/// Convert a stored counter, clamping corrupt negatives to zero
pub fn count_from_db(count: i32) -> u32 {
    u32::try_from(count).unwrap_or(0)
}

/// Convert PostModel to Post entity
impl From<PostModel> for Post {
    fn from(model: PostModel) -> Self {
        Post {
            id: PostId::new(model.id),
            content: model.content,
            created_at: model.created_at,
            expires_at: model.expires_at,
            reaction_count: count_from_db(model.reaction_count),
            author_id: model.user_id.map(UserId::new),
        }
    }
}

/// Convert Post entity reference to values for database insertion
pub struct PostInsert<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_id: Option<&'a str>,
}

impl<'a> PostInsert<'a> {
    pub fn new(post: &'a Post) -> Self {
        Self {
            id: post.id.as_str(),
            content: &post.content,
            created_at: post.created_at,
            expires_at: post.expires_at,
            user_id: post.author_id.as_ref().map(UserId::as_str),
        }
    }
}
