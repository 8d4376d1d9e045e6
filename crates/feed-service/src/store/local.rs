//! Local store: the whole feed in one cache entry
//!
//! Used when no backend is configured. Posts live as a JSON array under
//! [`LOCAL_POSTS_KEY`]; each entry carries the ids of the users who reacted,
//! so the count is always the size of that set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument, warn};

use feed_core::{is_live, ChangeEvent, Clock, KeyValueStore, Post, PostId, UserId};

use super::{FeedStore, ReactionReceipt, StoreMode, SubscriptionHandle, SweepReport};
use crate::error::{FeedError, FeedResult};

/// Cache key holding the local feed
pub const LOCAL_POSTS_KEY: &str = "feed_posts";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPost {
    #[serde(flatten)]
    post: Post,
    #[serde(default)]
    reactors: BTreeSet<UserId>,
}

impl CachedPost {
    fn to_post(&self) -> Post {
        let mut post = self.post.clone();
        post.reaction_count = u32::try_from(self.reactors.len()).unwrap_or(u32::MAX);
        post
    }
}

/// [`FeedStore`] kept entirely in a [`KeyValueStore`]
pub struct LocalEphemeralStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    /// Serialises read-modify-write of the cache entry
    lock: Mutex<()>,
}

impl LocalEphemeralStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Read the cached posts; an unreadable entry counts as empty
    async fn load(&self) -> FeedResult<Vec<CachedPost>> {
        let Some(raw) = self.kv.get(LOCAL_POSTS_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(posts) => Ok(posts),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable local feed");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, posts: &[CachedPost]) -> FeedResult<()> {
        let raw = serde_json::to_string(posts)
            .map_err(|e| FeedError::Internal(format!("serialize local feed: {e}")))?;
        self.kv.set(LOCAL_POSTS_KEY, raw).await?;
        Ok(())
    }

    /// Drop expired entries, returning how many went
    fn compact(posts: &mut Vec<CachedPost>, now: DateTime<Utc>) -> usize {
        let before = posts.len();
        posts.retain(|cached| is_live(&cached.post, now));
        before - posts.len()
    }

    /// Load and compact, persisting only if something expired
    async fn load_live(&self, now: DateTime<Utc>) -> FeedResult<(Vec<CachedPost>, usize)> {
        let mut posts = self.load().await?;
        let removed = Self::compact(&mut posts, now);
        if removed > 0 {
            self.save(&posts).await?;
            debug!(removed, "Compacted local feed");
        }
        Ok((posts, removed))
    }
}

#[async_trait]
impl FeedStore for LocalEphemeralStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Local
    }

    #[instrument(skip(self))]
    async fn fetch_snapshot(&self) -> FeedResult<Vec<Post>> {
        let _guard = self.lock.lock().await;
        let (mut posts, _) = self.load_live(self.clock.now()).await?;

        posts.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at));
        Ok(posts.iter().map(CachedPost::to_post).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_user_reaction_ids(&self, user_id: &UserId) -> FeedResult<HashSet<PostId>> {
        let now = self.clock.now();
        let posts = self.load().await?;

        Ok(posts
            .into_iter()
            .filter(|cached| is_live(&cached.post, now) && cached.reactors.contains(user_id))
            .map(|cached| cached.post.id)
            .collect())
    }

    #[instrument(skip(self, content))]
    async fn create_post(&self, content: &str, user_id: &UserId) -> FeedResult<Post> {
        let now = self.clock.now();
        let post = Post::new(content, now)?.with_author(user_id.clone());

        let _guard = self.lock.lock().await;
        let (mut posts, _) = self.load_live(now).await?;
        posts.insert(
            0,
            CachedPost {
                post: post.clone(),
                reactors: BTreeSet::new(),
            },
        );
        self.save(&posts).await?;

        info!(post_id = %post.id, "Post created locally");
        Ok(post)
    }

    #[instrument(skip(self))]
    async fn set_reaction(
        &self,
        post_id: &PostId,
        user_id: &UserId,
        desired: bool,
    ) -> FeedResult<ReactionReceipt> {
        let _guard = self.lock.lock().await;
        let (mut posts, _) = self.load_live(self.clock.now()).await?;

        let cached = posts
            .iter_mut()
            .find(|cached| &cached.post.id == post_id)
            .ok_or_else(|| FeedError::NotFound(post_id.clone()))?;

        let changed = if desired {
            cached.reactors.insert(user_id.clone())
        } else {
            cached.reactors.remove(user_id)
        };
        let reaction_count = cached.to_post().reaction_count;

        if changed {
            self.save(&posts).await?;
        }

        Ok(ReactionReceipt {
            post_id: post_id.clone(),
            reacted: desired,
            reaction_count,
        })
    }

    async fn subscribe(
        &self,
        _user_id: &UserId,
        _sink: mpsc::UnboundedSender<ChangeEvent>,
    ) -> FeedResult<SubscriptionHandle> {
        Ok(SubscriptionHandle::inert())
    }

    #[instrument(skip(self))]
    async fn sweep(&self, now: DateTime<Utc>) -> FeedResult<SweepReport> {
        let _guard = self.lock.lock().await;
        let (posts, removed) = self.load_live(now).await?;
        Ok(SweepReport {
            removed,
            retained: posts.len(),
        })
    }
}
