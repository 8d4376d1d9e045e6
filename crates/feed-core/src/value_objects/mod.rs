//! Value objects - immutable domain primitives

mod ids;

pub use ids::{IdParseError, PostId, UserId};
