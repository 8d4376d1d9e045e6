//! Ports implemented by the infrastructure crates

mod ports;
mod repositories;

pub use ports::{ChangeBus, KeyValueStore, SessionProvider};
pub use repositories::{PostRepository, ReactionRepository, RepoResult};
