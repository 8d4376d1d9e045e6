//! Domain entities - core business objects

mod post;
mod reaction;

pub use post::{validate_content, Post, MAX_CONTENT_CHARS};
pub use reaction::Reaction;
