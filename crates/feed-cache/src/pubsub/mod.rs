//! Redis Pub/Sub module.
//!
//! Carries change notifications from writers to every subscribed client.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{PubSubChannel, POSTS_CHANNEL, REACTIONS_CHANNEL_PREFIX};
pub use publisher::Publisher;
pub use subscriber::{Subscriber, SubscriberConfig, SubscriberError, SubscriberResult};
