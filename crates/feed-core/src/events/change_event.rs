//! Change events - notifications pushed by the authoritative store
//!
//! On the wire every change is a [`ChangeNotification`] tagged with the table
//! and the operation plus the affected row as JSON. Inside the process the
//! same information is carried as a typed [`ChangeEvent`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{Post, Reaction};
use crate::value_objects::{PostId, UserId};

/// Typed change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    // =========================================================================
    // Post Events
    // =========================================================================
    PostInserted(Post),
    PostUpdated(Post),
    PostDeleted { id: PostId },

    // =========================================================================
    // Reaction Events (scoped to one user)
    // =========================================================================
    ReactionInserted(Reaction),
    ReactionDeleted { post_id: PostId, user_id: UserId },
}

impl ChangeEvent {
    /// Get the event type as a string (for logging)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PostInserted(_) => "POST_INSERT",
            Self::PostUpdated(_) => "POST_UPDATE",
            Self::PostDeleted { .. } => "POST_DELETE",
            Self::ReactionInserted(_) => "REACTION_INSERT",
            Self::ReactionDeleted { .. } => "REACTION_DELETE",
        }
    }

    /// Id of the post this event concerns
    pub fn post_id(&self) -> &PostId {
        match self {
            Self::PostInserted(post) | Self::PostUpdated(post) => &post.id,
            Self::PostDeleted { id } => id,
            Self::ReactionInserted(reaction) => &reaction.post_id,
            Self::ReactionDeleted { post_id, .. } => post_id,
        }
    }

    /// Topic this event is delivered on
    pub fn topic(&self) -> ChangeTopic {
        match self {
            Self::PostInserted(_) | Self::PostUpdated(_) | Self::PostDeleted { .. } => {
                ChangeTopic::Posts
            }
            Self::ReactionInserted(reaction) => ChangeTopic::Reactions(reaction.user_id.clone()),
            Self::ReactionDeleted { user_id, .. } => ChangeTopic::Reactions(user_id.clone()),
        }
    }

    /// Encode into the wire envelope
    pub fn to_notification(&self) -> Result<ChangeNotification, serde_json::Error> {
        let (table, operation, row) = match self {
            Self::PostInserted(post) => (ChangeTable::Posts, Operation::Insert, serde_json::to_value(post)?),
            Self::PostUpdated(post) => (ChangeTable::Posts, Operation::Update, serde_json::to_value(post)?),
            Self::PostDeleted { id } => (
                ChangeTable::Posts,
                Operation::Delete,
                serde_json::to_value(PostKey { id: id.clone() })?,
            ),
            Self::ReactionInserted(reaction) => (
                ChangeTable::Reactions,
                Operation::Insert,
                serde_json::to_value(reaction)?,
            ),
            Self::ReactionDeleted { post_id, user_id } => (
                ChangeTable::Reactions,
                Operation::Delete,
                serde_json::to_value(ReactionKey {
                    post_id: post_id.clone(),
                    user_id: user_id.clone(),
                })?,
            ),
        };

        Ok(ChangeNotification {
            table,
            operation,
            row,
        })
    }
}

/// Subscription topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeTopic {
    /// Every insert/update/delete on posts
    Posts,
    /// Insert/delete on one user's reactions
    Reactions(UserId),
}

impl ChangeTopic {
    /// Check whether `event` is delivered on this topic
    pub fn carries(&self, event: &ChangeEvent) -> bool {
        &event.topic() == self
    }
}

// ============================================================================
// Wire envelope
// ============================================================================

/// Table a change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTable {
    Posts,
    Reactions,
}

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// Change notification as it travels over the change bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub table: ChangeTable,
    pub operation: Operation,
    pub row: serde_json::Value,
}

/// Key of a deleted post row
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PostKey {
    id: PostId,
}

/// Key of a deleted reaction row
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReactionKey {
    post_id: PostId,
    user_id: UserId,
}

/// Error decoding a wire notification
#[derive(Debug, Error)]
pub enum ChangeDecodeError {
    #[error("Unsupported operation {operation:?} on {table:?}")]
    Unsupported {
        table: ChangeTable,
        operation: Operation,
    },

    #[error("Malformed row: {0}")]
    MalformedRow(#[from] serde_json::Error),
}

impl TryFrom<ChangeNotification> for ChangeEvent {
    type Error = ChangeDecodeError;

    fn try_from(n: ChangeNotification) -> Result<Self, Self::Error> {
        let event = match (n.table, n.operation) {
            (ChangeTable::Posts, Operation::Insert) => {
                Self::PostInserted(serde_json::from_value(n.row)?)
            }
            (ChangeTable::Posts, Operation::Update) => {
                Self::PostUpdated(serde_json::from_value(n.row)?)
            }
            (ChangeTable::Posts, Operation::Delete) => {
                let key: PostKey = serde_json::from_value(n.row)?;
                Self::PostDeleted { id: key.id }
            }
            (ChangeTable::Reactions, Operation::Insert) => {
                Self::ReactionInserted(serde_json::from_value(n.row)?)
            }
            (ChangeTable::Reactions, Operation::Delete) => {
                let key: ReactionKey = serde_json::from_value(n.row)?;
                Self::ReactionDeleted {
                    post_id: key.post_id,
                    user_id: key.user_id,
                }
            }
            (table @ ChangeTable::Reactions, operation @ Operation::Update) => {
                return Err(ChangeDecodeError::Unsupported { table, operation });
            }
        };
        Ok(event)
    }
}
