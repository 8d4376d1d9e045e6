//! # feed-cache
//!
//! Redis-backed push channel plus the client-local caches.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Change Bus**: Post and reaction change notifications over Redis Pub/Sub
//! - **Key-Value Caches**: Redis, file and in-memory stores for the local feed
//! - **Anonymous Identity**: A persistent per-device user id
//!
//! ## Example
//!
//! ```ignore
//! use feed_cache::{RedisChangeBus, RedisPool, SubscriberConfig};
//!
//! let pool = RedisPool::connect(&config.redis).await?;
//! let bus = RedisChangeBus::new(pool, SubscriberConfig::default());
//! let mut events = bus.subscribe(&[ChangeTopic::Posts]).await?;
//! ```

pub mod bus;
pub mod identity;
pub mod kv;
pub mod pool;
pub mod pubsub;

pub use bus::RedisChangeBus;
pub use identity::{AnonymousSession, USER_ID_KEY};
pub use kv::{FileKeyValueStore, MemoryKeyValueStore, RedisKeyValueStore};
pub use pool::{RedisPool, RedisPoolError, RedisResult};
pub use pubsub::{
    PubSubChannel, Publisher, Subscriber, SubscriberConfig, SubscriberError, SubscriberResult,
    POSTS_CHANNEL, REACTIONS_CHANNEL_PREFIX,
};
