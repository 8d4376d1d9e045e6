//! # feed-core
//!
//! Domain layer containing entities, value objects, the expiry rules,
//! repository and collaborator ports, and change events.
//! This crate has zero dependencies on infrastructure (database, cache, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod expiration;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{validate_content, Post, Reaction, MAX_CONTENT_CHARS};
pub use error::DomainError;
pub use events::{
    ChangeDecodeError, ChangeEvent, ChangeNotification, ChangeTable, ChangeTopic, Operation,
};
pub use expiration::{
    expires_at_for, filter_live, is_live, post_ttl, Clock, ManualClock, SystemClock,
    POST_TTL_HOURS,
};
pub use traits::{
    ChangeBus, KeyValueStore, PostRepository, ReactionRepository, RepoResult, SessionProvider,
};
pub use value_objects::{IdParseError, PostId, UserId};
