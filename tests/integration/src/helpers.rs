//! Test helpers for integration tests
//!
//! Builds controllers over the in-memory fixtures (or a real backend when
//! the environment has one) and waits on their visible feed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use feed_cache::MemoryKeyValueStore;
use feed_common::{AppConfig, FeedMode};
use feed_core::{ChangeEvent, Clock, ManualClock, Post, PostId, UserId};
use feed_service::{FeedContext, FeedController, FeedEntry, LocalEphemeralStore, RemoteStore};

use crate::fixtures::{t0, unique_suffix, InMemoryBackend, InMemoryChangeBus};

/// How long to wait for pushed changes to show up
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// A shared backend several controllers can talk to
pub struct TestBackend {
    pub backend: Arc<InMemoryBackend>,
    pub bus: Arc<InMemoryChangeBus>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<RemoteStore>,
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBackend {
    pub fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let bus = Arc::new(InMemoryChangeBus::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(RemoteStore::new(
            backend.clone(),
            backend.clone(),
            bus.clone(),
            clock.clone(),
        ));
        Self {
            backend,
            bus,
            clock,
            store,
        }
    }

    /// Controller for `user_id`, not yet loaded
    pub fn controller(&self, user_id: UserId) -> FeedController {
        FeedController::new(self.store.clone(), user_id, self.clock.clone())
    }

    /// Controller that has loaded the feed and is listening for changes
    pub async fn started(&self, user_id: UserId) -> Result<FeedController> {
        let controller = self.controller(user_id);
        controller.load_initial().await?;
        controller.start().await;
        Ok(controller)
    }

    /// Wait until `controller` has applied everything published so far
    ///
    /// Sends a marker post through the bus and waits for it to come and go;
    /// events are applied in order, so anything sent earlier is in.
    pub async fn settle(&self, controller: &FeedController) -> Result<()> {
        let marker = Post::new(format!("marker {}", unique_suffix()), self.clock.now())?;
        let id = marker.id.clone();

        self.bus.inject(ChangeEvent::PostInserted(marker));
        wait_for(controller, |feed| feed.iter().any(|e| e.post.id == id)).await?;

        self.bus.inject(ChangeEvent::PostDeleted { id: id.clone() });
        wait_for(controller, |feed| feed.iter().all(|e| e.post.id != id)).await?;
        Ok(())
    }
}

/// Controller over the local store with an in-memory cache
pub fn local_controller(user_id: UserId) -> (FeedController, Arc<MemoryKeyValueStore>, Arc<ManualClock>) {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(LocalEphemeralStore::new(kv.clone(), clock.clone()));
    (FeedController::new(store, user_id, clock.clone()), kv, clock)
}

/// Wait until the visible feed satisfies `pred`
pub async fn wait_for<F>(controller: &FeedController, pred: F) -> Result<Vec<FeedEntry>>
where
    F: Fn(&[FeedEntry]) -> bool,
{
    let mut rx = controller.watch();
    let waited = tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            let current = controller.feed();
            if pred(&current) {
                return Ok::<_, anyhow::Error>(current);
            }
            rx.changed().await?;
        }
    })
    .await;

    match waited {
        Ok(result) => result,
        Err(_) => anyhow::bail!("feed did not settle: {:?}", controller.feed()),
    }
}

/// Visible `(user_reacted, reaction_count)` for a post
pub fn visible(controller: &FeedController, post_id: &PostId) -> Option<(bool, u32)> {
    controller
        .entry(post_id)
        .map(|entry| (entry.user_reacted, entry.post.reaction_count))
}

/// Load configuration for tests against a real backend
pub fn test_config() -> Result<AppConfig> {
    // Load from environment or use defaults
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    if !matches!(config.mode, FeedMode::Remote { .. }) {
        anyhow::bail!("remote mode required, got {}", config.mode.name());
    }
    Ok(config)
}

/// Context connected to the real backend
pub async fn remote_context() -> Result<FeedContext> {
    let config = test_config()?;
    Ok(FeedContext::from_config(&config).await?)
}

/// Helper to check if test environment is available
pub async fn check_test_env() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return false;
    }

    true
}
