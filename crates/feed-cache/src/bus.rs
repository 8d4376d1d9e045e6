//! Change bus over Redis Pub/Sub
//!
//! Writers publish through a pooled connection; readers share one
//! [`Subscriber`] whose decoded changes are filtered per subscription.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::instrument;

use feed_core::{ChangeBus, ChangeEvent, ChangeTopic, DomainError, RepoResult};

use crate::pool::RedisPool;
use crate::pubsub::{PubSubChannel, Publisher, Subscriber, SubscriberConfig};

/// [`ChangeBus`] backed by Redis
#[derive(Clone)]
pub struct RedisChangeBus {
    publisher: Publisher,
    subscriber: Arc<Subscriber>,
}

impl RedisChangeBus {
    /// Create a bus publishing through `pool` and listening per `config`
    pub fn new(pool: RedisPool, config: SubscriberConfig) -> Self {
        Self {
            publisher: Publisher::new(pool),
            subscriber: Arc::new(Subscriber::new(config)),
        }
    }
}

/// Turn a broadcast receiver into a stream of the events on `topics`
///
/// A lagging receiver skips what it missed and keeps going; the next full
/// reload repairs the view.
pub(crate) fn topic_stream(
    rx: broadcast::Receiver<ChangeEvent>,
    topics: HashSet<ChangeTopic>,
) -> BoxStream<'static, ChangeEvent> {
    stream::unfold((rx, topics), |(mut rx, topics)| async move {
        loop {
            match rx.recv().await {
                Ok(event) if topics.contains(&event.topic()) => return Some((event, (rx, topics))),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl ChangeBus for RedisChangeBus {
    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    async fn publish(&self, event: &ChangeEvent) -> RepoResult<()> {
        self.publisher.publish(event).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, topics: &[ChangeTopic]) -> RepoResult<BoxStream<'static, ChangeEvent>> {
        // Take the receiver before subscribing so nothing published after the
        // subscription is confirmed can be missed
        let rx = self.subscriber.receiver();

        let channels: Vec<PubSubChannel> = topics.iter().map(PubSubChannel::from).collect();
        self.subscriber
            .subscribe(&channels)
            .map_err(|e| DomainError::BusError(e.to_string()))?;

        Ok(topic_stream(rx, topics.iter().cloned().collect()))
    }
}
