//! Feed stores
//!
//! A [`FeedStore`] is chosen once at startup and fixed for the session:
//!
//! - [`RemoteStore`]: PostgreSQL repositories plus a Redis change bus
//! - [`LocalEphemeralStore`]: a JSON array in the client-local cache

mod local;
mod remote;

pub use local::{LocalEphemeralStore, LOCAL_POSTS_KEY};
pub use remote::RemoteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use feed_core::{ChangeEvent, Post, PostId, UserId};

use crate::error::FeedResult;

/// Which backend a store talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Remote,
    Local,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Outcome of a reaction write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionReceipt {
    pub post_id: PostId,
    /// Whether the user's reaction exists after the write
    pub reacted: bool,
    /// Authoritative count after the write
    pub reaction_count: u32,
}

/// Outcome of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired posts physically removed
    pub removed: usize,
    /// Live posts left behind
    pub retained: usize,
}

/// Live subscription to a store's changes
///
/// Unsubscribing is idempotent and also happens on drop.
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
    closed: AtomicBool,
}

impl SubscriptionHandle {
    /// Handle owning the task that forwards events
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            task: Some(task),
            closed: AtomicBool::new(false),
        }
    }

    /// Handle for a store that never pushes
    pub fn inert() -> Self {
        Self {
            task: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Stop delivering events
    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = &self.task {
            task.abort();
        }
        tracing::debug!("Feed subscription released");
    }

    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .field("pushes", &self.task.is_some())
            .finish()
    }
}

/// Storage capability behind the feed
#[async_trait]
pub trait FeedStore: Send + Sync {
    fn mode(&self) -> StoreMode;

    /// Live posts, newest first
    async fn fetch_snapshot(&self) -> FeedResult<Vec<Post>>;

    /// Ids of the posts `user_id` has reacted to
    async fn fetch_user_reaction_ids(&self, user_id: &UserId) -> FeedResult<HashSet<PostId>>;

    /// Store a new post authored by `user_id`
    async fn create_post(&self, content: &str, user_id: &UserId) -> FeedResult<Post>;

    /// Make the user's reaction on `post_id` exist (or not)
    ///
    /// Idempotent: asking for the state that already holds succeeds.
    async fn set_reaction(
        &self,
        post_id: &PostId,
        user_id: &UserId,
        desired: bool,
    ) -> FeedResult<ReactionReceipt>;

    /// Forward post changes and `user_id`'s reaction changes into `sink`
    async fn subscribe(
        &self,
        user_id: &UserId,
        sink: mpsc::UnboundedSender<ChangeEvent>,
    ) -> FeedResult<SubscriptionHandle>;

    /// Drop expired posts from whatever the store controls
    async fn sweep(&self, now: DateTime<Utc>) -> FeedResult<SweepReport>;
}

/// Sweep `store` at `now`, logging what was removed
pub async fn sweep(store: &dyn FeedStore, now: DateTime<Utc>) -> FeedResult<SweepReport> {
    let report = store.sweep(now).await?;
    if report.removed > 0 {
        tracing::info!(
            mode = %store.mode(),
            removed = report.removed,
            retained = report.retained,
            "Swept expired posts"
        );
    }
    Ok(report)
}
