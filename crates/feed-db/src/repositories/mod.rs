//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in feed-core.

mod error;
mod post;
mod reaction;

pub use post::PgPostRepository;
pub use reaction::PgReactionRepository;
