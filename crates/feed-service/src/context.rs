//! Feed context - dependency container
//!
//! Resolves the configuration into one concrete [`FeedStore`], the anonymous
//! session and the clock, and hands out controllers built on them.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use feed_cache::{
    AnonymousSession, FileKeyValueStore, MemoryKeyValueStore, RedisChangeBus, RedisKeyValueStore,
    RedisPool, SubscriberConfig,
};
use feed_common::{AppConfig, CacheBackend, DatabaseConfig, FeedMode, FeedSettings, RedisConfig};
use feed_core::{Clock, KeyValueStore, SessionProvider, SystemClock, UserId};
use feed_db::{create_pool, ensure_schema, PgPostRepository, PgReactionRepository, PoolConfig};

use crate::controller::{FeedController, DEFAULT_SWEEP_INTERVAL};
use crate::error::{FeedError, FeedResult};
use crate::store::{FeedStore, LocalEphemeralStore, RemoteStore};

/// Everything a client needs to run a feed
#[derive(Clone)]
pub struct FeedContext {
    store: Arc<dyn FeedStore>,
    session: Arc<AnonymousSession>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
}

impl FeedContext {
    /// Wire up the store selected by `config`
    ///
    /// Remote mode connects to PostgreSQL (creating the schema if needed) and
    /// Redis; local mode only opens the cache.
    pub async fn from_config(config: &AppConfig) -> FeedResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let kv = open_cache(&config.cache.backend).await?;
        let session = Arc::new(AnonymousSession::new(Arc::clone(&kv)));

        let store: Arc<dyn FeedStore> = match &config.mode {
            FeedMode::Remote { database, redis } => {
                remote_store(database, redis, &config.feed, Arc::clone(&clock)).await?
            }
            FeedMode::Local => Arc::new(LocalEphemeralStore::new(kv, Arc::clone(&clock))),
        };

        info!(
            mode = config.mode.name(),
            cache = config.cache.backend.name(),
            "Feed context ready"
        );

        Ok(Self {
            store,
            session,
            clock,
            sweep_interval: config.feed.sweep_interval(),
        })
    }

    pub fn builder() -> FeedContextBuilder {
        FeedContextBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<AnonymousSession> {
        &self.session
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Controller for an explicit user
    pub fn controller(&self, user_id: UserId) -> FeedController {
        FeedController::new(Arc::clone(&self.store), user_id, Arc::clone(&self.clock))
            .with_sweep_interval(self.sweep_interval)
    }

    /// Controller for whoever the session says is signed in
    pub async fn current_controller(&self) -> FeedResult<FeedController> {
        let user_id = self.session.current_user_id().await?;
        Ok(self.controller(user_id))
    }

    /// Start over with a new anonymous identity
    pub async fn reset_identity(&self) -> FeedResult<UserId> {
        Ok(self.session.reset().await?)
    }
}

async fn open_cache(backend: &CacheBackend) -> FeedResult<Arc<dyn KeyValueStore>> {
    let kv: Arc<dyn KeyValueStore> = match backend {
        CacheBackend::File { dir } => Arc::new(FileKeyValueStore::open(dir.clone()).await?),
        CacheBackend::Redis(redis) => {
            let pool = RedisPool::from_config(redis)
                .map_err(|e| FeedError::Remote(format!("cache: {e}")))?;
            Arc::new(RedisKeyValueStore::new(pool))
        }
        CacheBackend::Memory => Arc::new(MemoryKeyValueStore::new()),
    };
    Ok(kv)
}

async fn remote_store(
    database: &DatabaseConfig,
    redis: &RedisConfig,
    settings: &FeedSettings,
    clock: Arc<dyn Clock>,
) -> FeedResult<Arc<dyn FeedStore>> {
    let pool = create_pool(&PoolConfig::from(database))
        .await
        .map_err(|e| FeedError::Remote(format!("database: {e}")))?;
    ensure_schema(&pool)
        .await
        .map_err(|e| FeedError::Remote(format!("schema: {e}")))?;

    let redis_pool = RedisPool::connect(redis)
        .await
        .map_err(|e| FeedError::Remote(format!("redis: {e}")))?;
    let bus = RedisChangeBus::new(
        redis_pool,
        SubscriberConfig {
            redis_url: redis.url.clone(),
            reconnect_delay_ms: settings.subscriber_reconnect_ms,
            ..SubscriberConfig::default()
        },
    );

    Ok(Arc::new(RemoteStore::new(
        Arc::new(PgPostRepository::new(pool.clone())),
        Arc::new(PgReactionRepository::new(pool)),
        Arc::new(bus),
        clock,
    )))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`FeedContext`] with explicit collaborators
#[derive(Default)]
pub struct FeedContextBuilder {
    store: Option<Arc<dyn FeedStore>>,
    session: Option<Arc<AnonymousSession>>,
    clock: Option<Arc<dyn Clock>>,
    sweep_interval: Option<Duration>,
}

impl FeedContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn FeedStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn session(mut self, session: Arc<AnonymousSession>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Build the context; a store is required
    pub fn build(self) -> FeedResult<FeedContext> {
        let store = self
            .store
            .ok_or_else(|| FeedError::Configuration("feed store is required".to_string()))?;

        Ok(FeedContext {
            store,
            session: self.session.unwrap_or_else(|| {
                Arc::new(AnonymousSession::new(Arc::new(MemoryKeyValueStore::new())))
            }),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sweep_interval: self.sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL),
        })
    }
}
