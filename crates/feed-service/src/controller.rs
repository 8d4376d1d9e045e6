//! Feed controller
//!
//! Owns the merged [`Feed`] for one user and drives it from three sources:
//! user commands, the store's change subscription and a periodic sweep.
//!
//! The feed sits behind a short-lived `parking_lot` mutex that is never held
//! across an `.await`. Reaction writes to the same post are queued on a
//! per-post async lock; a queued toggle that has been superseded by a newer
//! one skips its store call.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use feed_core::{filter_live, is_live, ChangeEvent, Clock, Post, PostId, UserId};

use crate::dto::CreatePostRequest;
use crate::error::{FeedError, FeedResult};
use crate::merge::{Feed, FeedEntry};
use crate::store::{self, FeedStore, StoreMode, SubscriptionHandle, SweepReport};

/// Default period of the background sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Inner {
    store: Arc<dyn FeedStore>,
    clock: Arc<dyn Clock>,
    user_id: UserId,
    feed: parking_lot::Mutex<Feed>,
    updates: watch::Sender<Vec<FeedEntry>>,
    post_locks: DashMap<PostId, Arc<tokio::sync::Mutex<()>>>,
}

impl Inner {
    fn visible_at(&self, now: DateTime<Utc>) -> Vec<FeedEntry> {
        let entries = self.feed.lock().entries();
        entries
            .into_iter()
            .filter(|entry| is_live(&entry.post, now))
            .collect()
    }

    /// Push the current visible feed to watchers
    fn publish(&self) -> Vec<FeedEntry> {
        let entries = self.visible_at(self.clock.now());
        self.updates.send_replace(entries.clone());
        entries
    }

    fn apply_event(&self, event: ChangeEvent) {
        let event_type = event.event_type();
        let changed = self.feed.lock().apply(event);
        debug!(event_type, changed, "Merged change event");
        if changed {
            self.publish();
        }
    }

    async fn sweep(&self) -> FeedResult<SweepReport> {
        let now = self.clock.now();
        let report = store::sweep(self.store.as_ref(), now).await?;

        let removed = self.feed.lock().retain_live(now);
        for id in &removed {
            self.post_locks.remove(id);
        }
        if !removed.is_empty() {
            debug!(removed = removed.len(), "Expired posts left the feed");
            self.publish();
        }
        Ok(report)
    }
}

struct Running {
    subscription: Option<SubscriptionHandle>,
    tasks: Vec<JoinHandle<()>>,
}

/// Feed for one user on top of a [`FeedStore`]
pub struct FeedController {
    inner: Arc<Inner>,
    sweep_interval: Duration,
    running: parking_lot::Mutex<Option<Running>>,
}

impl FeedController {
    pub fn new(store: Arc<dyn FeedStore>, user_id: UserId, clock: Arc<dyn Clock>) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                feed: parking_lot::Mutex::new(Feed::new(user_id.clone())),
                user_id,
                updates,
                post_locks: DashMap::new(),
            }),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            running: parking_lot::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    pub fn mode(&self) -> StoreMode {
        self.inner.store.mode()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Sweep, then replace the feed with a fresh snapshot
    ///
    /// Failing to read the user's reactions is not fatal; the feed loads with
    /// every flag cleared. Pending reaction intents are dropped.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn load_initial(&self) -> FeedResult<Vec<FeedEntry>> {
        let store = &self.inner.store;
        let now = self.inner.clock.now();

        if let Err(e) = store::sweep(store.as_ref(), now).await {
            warn!(error = %e, "Sweep before load failed");
        }

        let (snapshot, reacted) = tokio::join!(
            store.fetch_snapshot(),
            store.fetch_user_reaction_ids(&self.inner.user_id)
        );
        let posts = filter_live(snapshot?, now);
        let reacted = reacted.unwrap_or_else(|e| {
            warn!(error = %e, "Could not load reactions, showing none");
            HashSet::new()
        });

        info!(posts = posts.len(), reacted = reacted.len(), mode = %store.mode(), "Feed loaded");
        self.inner.feed.lock().replace_snapshot(posts, &reacted);
        Ok(self.inner.publish())
    }

    /// Publish a post, showing it immediately as a placeholder
    #[instrument(skip(self, content))]
    pub async fn create_post(&self, content: &str) -> FeedResult<Post> {
        let request = CreatePostRequest::new(content);
        request.validate()?;

        let placeholder = Post::new(request.content.as_str(), self.inner.clock.now())?
            .with_author(self.inner.user_id.clone());
        let local_id = placeholder.id.clone();
        self.inner.feed.lock().add_placeholder(placeholder);
        self.inner.publish();

        match self
            .inner
            .store
            .create_post(&request.content, &self.inner.user_id)
            .await
        {
            Ok(post) => {
                self.inner
                    .feed
                    .lock()
                    .confirm_placeholder(&local_id, post.clone());
                self.inner.publish();
                info!(post_id = %post.id, "Post published");
                Ok(post)
            }
            Err(e) => {
                self.inner.feed.lock().discard_placeholder(&local_id);
                self.inner.publish();
                warn!(error = %e, "Post could not be published");
                Err(e)
            }
        }
    }

    /// Flip the user's reaction on `post_id`
    ///
    /// The visible state changes before the store is asked. Only definite
    /// failures roll it back; anything else leaves it pending until a
    /// confirming event or the next [`load_initial`](Self::load_initial).
    #[instrument(skip(self), fields(post_id = %post_id))]
    pub async fn toggle_reaction(&self, post_id: &PostId) -> FeedResult<()> {
        let (ticket, desired) = self
            .inner
            .feed
            .lock()
            .begin_reaction(post_id)
            .ok_or_else(|| FeedError::NotFound(post_id.clone()))?;
        self.inner.publish();

        let lock = Arc::clone(&self.inner.post_locks.entry(post_id.clone()).or_default());
        let _guard = lock.lock().await;

        let current = self.inner.feed.lock().tracker().is_current(post_id, ticket);
        if !current {
            debug!(ticket = ticket.value(), "Toggle superseded, skipping store call");
            return Ok(());
        }

        match self
            .inner
            .store
            .set_reaction(post_id, &self.inner.user_id, desired)
            .await
        {
            Ok(receipt) => {
                self.inner.feed.lock().apply_receipt(&receipt, ticket);
                self.inner.publish();
                debug!(reacted = receipt.reacted, count = receipt.reaction_count, "Reaction stored");
                Ok(())
            }
            Err(e) if e.is_definite() => {
                self.inner.feed.lock().rollback(post_id, ticket);
                self.inner.publish();
                warn!(error = %e, "Reaction rejected, rolled back");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Reaction not confirmed, left pending");
                Err(e)
            }
        }
    }

    /// Randomise display order; nothing is written anywhere
    pub fn shuffle(&self) {
        self.inner.feed.lock().shuffle();
        self.inner.publish();
    }

    /// Sweep the store and drop expired posts from the feed
    pub async fn sweep(&self) -> FeedResult<SweepReport> {
        self.inner.sweep().await
    }

    /// Merge a change event as if it came from the subscription
    pub fn apply_event(&self, event: ChangeEvent) {
        self.inner.apply_event(event);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Visible feed, in display order
    pub fn feed(&self) -> Vec<FeedEntry> {
        self.inner.visible_at(self.inner.clock.now())
    }

    pub fn entry(&self, post_id: &PostId) -> Option<FeedEntry> {
        let now = self.inner.clock.now();
        self.inner
            .feed
            .lock()
            .entry(post_id)
            .filter(|entry| is_live(&entry.post, now))
    }

    /// Receive the visible feed each time it changes
    pub fn watch(&self) -> watch::Receiver<Vec<FeedEntry>> {
        self.inner.updates.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Subscribe to store changes and start the periodic sweep
    ///
    /// A failed subscription is logged; the feed then only changes through
    /// local commands and reloads. Calling `start` twice is a no-op.
    pub async fn start(&self) {
        if self.is_running() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = match self.inner.store.subscribe(&self.inner.user_id, tx).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Subscription failed, feed will not update live");
                None
            }
        };

        let inner = Arc::clone(&self.inner);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                inner.apply_event(event);
            }
            debug!("Event pump stopped");
        });

        let inner = Arc::clone(&self.inner);
        let period = self.sweep_interval;
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately; load_initial already swept
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = inner.sweep().await {
                    warn!(error = %e, "Periodic sweep failed");
                }
            }
        });

        let mut running = self.running.lock();
        if running.is_some() {
            pump.abort();
            sweeper.abort();
            return;
        }
        *running = Some(Running {
            subscription,
            tasks: vec![pump, sweeper],
        });
        info!(user_id = %self.inner.user_id, "Feed controller started");
    }

    /// Release the subscription and stop background work
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        if let Some(subscription) = running.subscription {
            subscription.unsubscribe();
        }
        for task in running.tasks {
            task.abort();
        }
        info!(user_id = %self.inner.user_id, "Feed controller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.stop();
    }
}
