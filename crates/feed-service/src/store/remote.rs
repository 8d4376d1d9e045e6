//! Remote store: authoritative repositories plus a change bus

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use feed_core::{
    filter_live, validate_content, ChangeBus, ChangeEvent, ChangeTopic, Clock, DomainError, Post,
    PostId, PostRepository, Reaction, ReactionRepository, UserId,
};

use super::{FeedStore, ReactionReceipt, StoreMode, SubscriptionHandle, SweepReport};
use crate::error::{FeedError, FeedResult};

/// [`FeedStore`] over the shared backend
///
/// Writes go to the repositories; each successful write is then announced on
/// the bus so other clients see it.
#[derive(Clone)]
pub struct RemoteStore {
    posts: Arc<dyn PostRepository>,
    reactions: Arc<dyn ReactionRepository>,
    bus: Arc<dyn ChangeBus>,
    clock: Arc<dyn Clock>,
}

impl RemoteStore {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        reactions: Arc<dyn ReactionRepository>,
        bus: Arc<dyn ChangeBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            reactions,
            bus,
            clock,
        }
    }

    /// Announce a change; a failed publish never fails the write
    async fn announce(&self, event: ChangeEvent) {
        if let Err(e) = self.bus.publish(&event).await {
            warn!(event_type = event.event_type(), post_id = %event.post_id(), error = %e, "Failed to publish change");
        }
    }

    /// Announce the post's new count after a reaction write
    async fn announce_count(&self, post_id: &PostId, reaction_count: u32) {
        match self.posts.find_by_id(post_id).await {
            Ok(Some(mut post)) => {
                post.reaction_count = reaction_count;
                self.announce(ChangeEvent::PostUpdated(post)).await;
            }
            Ok(None) => {}
            Err(e) => warn!(post_id = %post_id, error = %e, "Failed to load post for count update"),
        }
    }

    async fn current_count(&self, post_id: &PostId) -> FeedResult<u32> {
        self.posts
            .find_by_id(post_id)
            .await?
            .map(|post| post.reaction_count)
            .ok_or_else(|| FeedError::NotFound(post_id.clone()))
    }
}

#[async_trait]
impl FeedStore for RemoteStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Remote
    }

    #[instrument(skip(self))]
    async fn fetch_snapshot(&self) -> FeedResult<Vec<Post>> {
        let now = self.clock.now();
        let posts = self.posts.find_live(now).await?;
        Ok(filter_live(posts, now))
    }

    #[instrument(skip(self))]
    async fn fetch_user_reaction_ids(&self, user_id: &UserId) -> FeedResult<HashSet<PostId>> {
        Ok(self.reactions.find_post_ids_by_user(user_id).await?)
    }

    #[instrument(skip(self, content))]
    async fn create_post(&self, content: &str, user_id: &UserId) -> FeedResult<Post> {
        validate_content(content)?;
        let post = Post::new(content, self.clock.now())?.with_author(user_id.clone());

        self.posts.create(&post).await?;
        info!(post_id = %post.id, "Post created");

        self.announce(ChangeEvent::PostInserted(post.clone())).await;
        Ok(post)
    }

    #[instrument(skip(self))]
    async fn set_reaction(
        &self,
        post_id: &PostId,
        user_id: &UserId,
        desired: bool,
    ) -> FeedResult<ReactionReceipt> {
        let reaction_count = if desired {
            let reaction = Reaction::new(post_id.clone(), user_id.clone(), self.clock.now());
            match self.reactions.create(&reaction).await {
                Ok(count) => {
                    self.announce(ChangeEvent::ReactionInserted(reaction)).await;
                    self.announce_count(post_id, count).await;
                    count
                }
                Err(DomainError::DuplicateReaction) => {
                    debug!("Reaction already present");
                    self.current_count(post_id).await?
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            let count = self.reactions.delete(post_id, user_id).await?;
            self.announce(ChangeEvent::ReactionDeleted {
                post_id: post_id.clone(),
                user_id: user_id.clone(),
            })
            .await;
            self.announce_count(post_id, count).await;
            count
        };

        Ok(ReactionReceipt {
            post_id: post_id.clone(),
            reacted: desired,
            reaction_count,
        })
    }

    #[instrument(skip(self, sink))]
    async fn subscribe(
        &self,
        user_id: &UserId,
        sink: mpsc::UnboundedSender<ChangeEvent>,
    ) -> FeedResult<SubscriptionHandle> {
        let topics = [ChangeTopic::Posts, ChangeTopic::Reactions(user_id.clone())];
        let mut events = self.bus.subscribe(&topics).await?;

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if sink.send(event).is_err() {
                    break;
                }
            }
            debug!("Change stream ended");
        });

        info!("Subscribed to feed changes");
        Ok(SubscriptionHandle::new(task))
    }

    /// Rows are never deleted here; expiry is a read-side filter
    async fn sweep(&self, _now: DateTime<Utc>) -> FeedResult<SweepReport> {
        Ok(SweepReport::default())
    }
}
