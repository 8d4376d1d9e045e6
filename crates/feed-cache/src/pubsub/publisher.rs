//! Redis Pub/Sub publisher.
//!
//! Publishes change notifications on the channel of their topic.

use feed_core::ChangeEvent;
use redis::AsyncCommands;

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::PubSubChannel;

/// Redis Pub/Sub publisher
#[derive(Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Encode a change the way it travels on the wire
    pub fn encode(event: &ChangeEvent) -> RedisResult<(PubSubChannel, String)> {
        let channel = PubSubChannel::from(&event.topic());
        let payload = serde_json::to_string(&event.to_notification()?)?;
        Ok((channel, payload))
    }

    /// Publish a change and return the number of receivers
    pub async fn publish(&self, event: &ChangeEvent) -> RedisResult<u32> {
        let (channel, payload) = Self::encode(event)?;
        let channel_name = channel.name();

        let mut conn = self.pool.get().await?;
        let receivers: u32 = conn.publish(&channel_name, &payload).await?;

        tracing::debug!(
            channel = %channel_name,
            event_type = event.event_type(),
            receivers = receivers,
            "Published change"
        );

        Ok(receivers)
    }
}
