//! Pub/Sub channel definitions.
//!
//! One channel carries every post change; reaction changes are split per user
//! so a client only hears about its own reactions.

use feed_core::{ChangeTopic, UserId};

/// Channel for post inserts, updates and deletes
pub const POSTS_CHANNEL: &str = "feed:posts";
/// Channel prefix for one user's reaction changes
pub const REACTIONS_CHANNEL_PREFIX: &str = "feed:reactions:";

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Every post change
    Posts,
    /// Reaction changes made by one user
    Reactions(UserId),
    /// Any other channel name
    Custom(String),
}

impl PubSubChannel {
    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Posts => POSTS_CHANNEL.to_string(),
            Self::Reactions(user_id) => format!("{REACTIONS_CHANNEL_PREFIX}{user_id}"),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name == POSTS_CHANNEL {
            return Self::Posts;
        }

        if let Some(user) = name.strip_prefix(REACTIONS_CHANNEL_PREFIX) {
            if let Ok(user_id) = UserId::parse(user) {
                return Self::Reactions(user_id);
            }
        }

        Self::Custom(name.to_string())
    }

    /// Topic carried by this channel, if any
    #[must_use]
    pub fn topic(&self) -> Option<ChangeTopic> {
        match self {
            Self::Posts => Some(ChangeTopic::Posts),
            Self::Reactions(user_id) => Some(ChangeTopic::Reactions(user_id.clone())),
            Self::Custom(_) => None,
        }
    }
}

impl From<&ChangeTopic> for PubSubChannel {
    fn from(topic: &ChangeTopic) -> Self {
        match topic {
            ChangeTopic::Posts => Self::Posts,
            ChangeTopic::Reactions(user_id) => Self::Reactions(user_id.clone()),
        }
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
