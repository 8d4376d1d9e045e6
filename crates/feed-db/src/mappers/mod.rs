//! Entity to model mappers
//!
//! - `From<Model> for Entity`: Convert database rows to domain objects
//! - `*Insert` structs: Prepare entity data for database operations

mod post;
mod reaction;

pub use post::{count_from_db, PostInsert};
pub use reaction::ReactionInsert;
