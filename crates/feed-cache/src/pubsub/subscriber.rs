//! Redis Pub/Sub subscriber.
//!
//! One dedicated Pub/Sub connection lives in a background task that decodes
//! notifications into [`ChangeEvent`]s and fans them out over a broadcast
//! channel. After a reconnect the task re-subscribes to every channel it has
//! been asked for, so an outage only loses the changes sent while it lasted.

use feed_core::{ChangeEvent, ChangeNotification};
use futures_util::StreamExt;
use redis::Client;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::pool::redact_url;
use crate::pubsub::PubSubChannel;

/// Upper bound for the reconnect backoff
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("subscriber task has stopped")]
    Stopped,
}

pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub redis_url: String,
    /// Capacity of the fan-out channel; slower readers lag past this
    pub broadcast_buffer: usize,
    /// First reconnect delay, doubled after each consecutive failure
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

impl SubscriberConfig {
    fn backoff(&self, failures: u32) -> Duration {
        let base = Duration::from_millis(self.reconnect_delay_ms.max(1));
        base.saturating_mul(1 << failures.min(16))
            .min(MAX_RECONNECT_DELAY.max(base))
    }
}

/// Decode a wire notification, dropping anything malformed
///
/// A change must belong to the channel it arrived on.
pub(crate) fn decode(channel: &str, payload: &str) -> Option<ChangeEvent> {
    let decoded = serde_json::from_str::<ChangeNotification>(payload)
        .map_err(|e| e.to_string())
        .and_then(|n| ChangeEvent::try_from(n).map_err(|e| e.to_string()));
    let event = match decoded {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!(channel, error = %error, "Dropping undecodable change");
            return None;
        }
    };

    if PubSubChannel::parse(channel).topic() != Some(event.topic()) {
        tracing::warn!(channel, event_type = event.event_type(), "Dropping change sent on the wrong channel");
        return None;
    }
    Some(event)
}

/// Why a listener session ended
enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Redis Pub/Sub subscriber; the background task stops when this is dropped
pub struct Subscriber {
    events: broadcast::Sender<ChangeEvent>,
    channels_tx: mpsc::UnboundedSender<Vec<String>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl Subscriber {
    /// Start the background listener
    pub fn new(config: SubscriberConfig) -> Self {
        let (events, _) = broadcast::channel(config.broadcast_buffer.max(1));
        let (channels_tx, channels_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(listen(config, events.clone(), channels_rx, shutdown_rx));

        Self {
            events,
            channels_tx,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Ask the listener to join `channels`; already joined ones are skipped
    pub fn subscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names = channels.iter().map(PubSubChannel::name).collect();
        self.channels_tx
            .send(names)
            .map_err(|_| SubscriberError::Stopped)
    }

    /// New receiver for every change decoded from here on
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn listen(
    config: SubscriberConfig,
    events: broadcast::Sender<ChangeEvent>,
    mut channels_rx: mpsc::UnboundedReceiver<Vec<String>>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let mut joined = BTreeSet::new();
    let mut failures = 0u32;

    loop {
        let session = run_session(
            &config,
            &events,
            &mut joined,
            &mut channels_rx,
            &mut shutdown_rx,
            &mut failures,
        );
        match session.await {
            Ok(SessionEnd::Shutdown) => {
                tracing::info!("Change subscriber stopped");
                return;
            }
            Ok(SessionEnd::Disconnected) => {
                tracing::warn!("Pub/Sub connection closed, reconnecting");
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                tracing::error!(error = %e, failures, "Change subscriber failed, reconnecting");
            }
        }

        let delay = config.backoff(failures);
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = &mut shutdown_rx => return,
        }
    }
}

/// One connection's lifetime
async fn run_session(
    config: &SubscriberConfig,
    events: &broadcast::Sender<ChangeEvent>,
    joined: &mut BTreeSet<String>,
    channels_rx: &mut mpsc::UnboundedReceiver<Vec<String>>,
    shutdown_rx: &mut tokio::sync::oneshot::Receiver<()>,
    failures: &mut u32,
) -> SubscriberResult<SessionEnd> {
    let client = Client::open(config.redis_url.as_str())?;
    let mut pubsub = client.get_async_pubsub().await?;
    for channel in joined.iter() {
        pubsub.subscribe(channel).await?;
    }
    *failures = 0;
    tracing::info!(
        url = %redact_url(&config.redis_url),
        channels = joined.len(),
        "Change subscriber connected"
    );

    loop {
        let mut stream = pubsub.on_message();
        let wanted = tokio::select! {
            msg = stream.next() => {
                let Some(msg) = msg else {
                    return Ok(SessionEnd::Disconnected);
                };
                let payload: String = msg.get_payload().unwrap_or_default();
                if let Some(event) = decode(msg.get_channel_name(), &payload) {
                    // No receivers is fine
                    let _ = events.send(event);
                }
                continue;
            }
            wanted = channels_rx.recv() => wanted,
            _ = &mut *shutdown_rx => return Ok(SessionEnd::Shutdown),
        };
        drop(stream);

        let Some(wanted) = wanted else {
            return Ok(SessionEnd::Shutdown);
        };
        for channel in wanted {
            if joined.insert(channel.clone()) {
                pubsub.subscribe(&channel).await?;
                tracing::debug!(channel = %channel, "Joined channel");
            }
        }
    }
}
