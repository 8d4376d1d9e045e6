//! # feed-service
//!
//! Application layer: the two feed store variants, the optimistic mutation
//! tracker, the event merge reducer and the feed controller that ties them
//! together for a UI.

pub mod context;
pub mod controller;
pub mod dto;
pub mod error;
pub mod merge;
pub mod store;
pub mod tracker;

pub use context::{FeedContext, FeedContextBuilder};
pub use controller::FeedController;
pub use dto::CreatePostRequest;
pub use error::{FeedError, FeedResult};
pub use merge::{reduce, Feed, FeedEntry};
pub use store::{
    sweep, FeedStore, LocalEphemeralStore, ReactionReceipt, RemoteStore, StoreMode,
    SubscriptionHandle, SweepReport, LOCAL_POSTS_KEY,
};
pub use tracker::{MutationTracker, ReactionIntent, Ticket};
