//! Post entity - a short message that lives for 24 hours

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::expiration::expires_at_for;
use crate::value_objects::{PostId, UserId};

/// Maximum post length in Unicode scalar values
pub const MAX_CONTENT_CHARS: usize = 140;

/// Post entity
///
/// `reaction_count` is the authoritative number of reaction rows that
/// reference this post. Whether the current user reacted is not part of the
/// record; it is derived per viewer from the reaction set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub reaction_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
}

impl Post {
    /// Create a new post at `now`, minting a fresh id
    ///
    /// Fails if the content is blank or longer than [`MAX_CONTENT_CHARS`].
    pub fn new(content: impl Into<String>, now: DateTime<Utc>) -> Result<Self, DomainError> {
        Self::with_id(PostId::generate(), content, now)
    }

    /// Create a new post with a caller-chosen id
    pub fn with_id(
        id: PostId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        validate_content(&content)?;

        Ok(Self {
            id,
            content,
            created_at: now,
            expires_at: expires_at_for(now),
            reaction_count: 0,
            author_id: None,
        })
    }

    /// Attach the authoring user
    #[must_use]
    pub fn with_author(mut self, author_id: UserId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}

/// Check post content against the length rules
pub fn validate_content(content: &str) -> Result<(), DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(DomainError::ContentTooLong {
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(())
}
