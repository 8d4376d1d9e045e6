//! Test fixtures
//!
//! An in-memory authoritative store with failure injection and a write gate,
//! and an in-memory change bus that can hold back deliveries.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, watch};

use feed_core::{
    ChangeBus, ChangeEvent, ChangeTopic, DomainError, Post, PostId, PostRepository, Reaction,
    ReactionRepository, RepoResult, UserId,
};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A user id no other test uses
pub fn unique_user() -> UserId {
    UserId::new(format!("test-user-{}", unique_suffix()))
}

/// Fixed starting instant for clock-driven tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// ============================================================================
// Authoritative store
// ============================================================================

/// How injected write failures look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Backend unreachable
    Unavailable,
    /// The post is gone
    MissingPost,
}

#[derive(Default)]
struct BackendState {
    posts: HashMap<PostId, Post>,
    reactions: HashSet<(PostId, UserId)>,
}

/// Post and reaction repositories over shared in-process state
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    failure: Mutex<Option<Failure>>,
    post_writes: AtomicUsize,
    reaction_writes: AtomicUsize,
    /// `true` while reaction writes may proceed
    gate: watch::Sender<bool>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Mutex::new(BackendState::default()),
            failure: Mutex::new(None),
            post_writes: AtomicUsize::new(0),
            reaction_writes: AtomicUsize::new(0),
            gate,
        }
    }

    /// Make every following write fail (or succeed again with `None`)
    pub fn fail_writes(&self, failure: Option<Failure>) {
        *self.failure.lock() = failure;
    }

    /// Hold reaction writes until [`resume_reactions`](Self::resume_reactions)
    pub fn pause_reactions(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume_reactions(&self) {
        self.gate.send_replace(true);
    }

    /// Number of post inserts attempted
    pub fn post_writes(&self) -> usize {
        self.post_writes.load(Ordering::SeqCst)
    }

    /// Number of reaction inserts/deletes attempted
    pub fn reaction_writes(&self) -> usize {
        self.reaction_writes.load(Ordering::SeqCst)
    }

    /// Put a post straight into the store
    pub fn seed(&self, post: Post) {
        self.state.lock().posts.insert(post.id.clone(), post);
    }

    /// Remove a post and its reactions, as a moderator would
    pub fn remove_post(&self, id: &PostId) -> bool {
        let mut state = self.state.lock();
        state.reactions.retain(|(post_id, _)| post_id != id);
        state.posts.remove(id).is_some()
    }

    pub fn post(&self, id: &PostId) -> Option<Post> {
        self.state.lock().posts.get(id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().posts.len()
    }

    pub fn has_reaction(&self, post_id: &PostId, user_id: &UserId) -> bool {
        self.state
            .lock()
            .reactions
            .contains(&(post_id.clone(), user_id.clone()))
    }

    fn injected(&self, post_id: &PostId) -> RepoResult<()> {
        match *self.failure.lock() {
            Some(Failure::Unavailable) => {
                Err(DomainError::DatabaseError("connection refused".to_string()))
            }
            Some(Failure::MissingPost) => Err(DomainError::PostNotFound(post_id.clone())),
            None => Ok(()),
        }
    }

    async fn wait_for_gate(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl PostRepository for InMemoryBackend {
    async fn find_live(&self, now: DateTime<Utc>) -> RepoResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .state
            .lock()
            .posts
            .values()
            .filter(|post| post.expires_at > now)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn find_by_id(&self, id: &PostId) -> RepoResult<Option<Post>> {
        Ok(self.post(id))
    }

    async fn create(&self, post: &Post) -> RepoResult<()> {
        self.post_writes.fetch_add(1, Ordering::SeqCst);
        self.injected(&post.id)?;
        self.seed(post.clone());
        Ok(())
    }
}

#[async_trait]
impl ReactionRepository for InMemoryBackend {
    async fn find_post_ids_by_user(&self, user_id: &UserId) -> RepoResult<HashSet<PostId>> {
        Ok(self
            .state
            .lock()
            .reactions
            .iter()
            .filter(|(_, user)| user == user_id)
            .map(|(post_id, _)| post_id.clone())
            .collect())
    }

    async fn create(&self, reaction: &Reaction) -> RepoResult<u32> {
        self.wait_for_gate().await;
        self.reaction_writes.fetch_add(1, Ordering::SeqCst);
        self.injected(&reaction.post_id)?;

        let mut state = self.state.lock();
        if !state.posts.contains_key(&reaction.post_id) {
            return Err(DomainError::PostNotFound(reaction.post_id.clone()));
        }
        if !state
            .reactions
            .insert((reaction.post_id.clone(), reaction.user_id.clone()))
        {
            return Err(DomainError::DuplicateReaction);
        }
        let post = state
            .posts
            .get_mut(&reaction.post_id)
            .ok_or_else(|| DomainError::PostNotFound(reaction.post_id.clone()))?;
        post.reaction_count += 1;
        Ok(post.reaction_count)
    }

    async fn delete(&self, post_id: &PostId, user_id: &UserId) -> RepoResult<u32> {
        self.wait_for_gate().await;
        self.reaction_writes.fetch_add(1, Ordering::SeqCst);
        self.injected(post_id)?;

        let mut state = self.state.lock();
        let removed = state.reactions.remove(&(post_id.clone(), user_id.clone()));
        let post = state
            .posts
            .get_mut(post_id)
            .ok_or_else(|| DomainError::PostNotFound(post_id.clone()))?;
        if removed {
            post.reaction_count = post.reaction_count.saturating_sub(1);
        }
        Ok(post.reaction_count)
    }
}

// ============================================================================
// Change bus
// ============================================================================

/// [`ChangeBus`] over a tokio broadcast channel
pub struct InMemoryChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
    published: Mutex<Vec<ChangeEvent>>,
    /// `Some` while deliveries are held back
    held: Mutex<Option<Vec<ChangeEvent>>>,
    fail_publish: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl Default for InMemoryChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            tx,
            published: Mutex::new(Vec::new()),
            held: Mutex::new(None),
            fail_publish: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    /// Record publishes but stop delivering them
    pub fn hold(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            *held = Some(Vec::new());
        }
    }

    /// Deliver everything held back, in publish order
    pub fn release(&self) -> usize {
        let events = self.held.lock().take().unwrap_or_default();
        let count = events.len();
        for event in events {
            let _ = self.tx.send(event);
        }
        count
    }

    /// Deliver only the held events on `topic`, keeping the rest back
    pub fn release_topic(&self, topic: &ChangeTopic) -> usize {
        let mut held = self.held.lock();
        let Some(queue) = held.as_mut() else {
            return 0;
        };
        let (ready, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|event| topic.carries(event));
        *queue = rest;
        for event in &ready {
            let _ = self.tx.send(event.clone());
        }
        ready.len()
    }

    /// Deliver an event as if another client had published it
    pub fn inject(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Everything successfully published so far
    pub fn published(&self) -> Vec<ChangeEvent> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl ChangeBus for InMemoryChangeBus {
    async fn publish(&self, event: &ChangeEvent) -> RepoResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(DomainError::BusError("publish refused".to_string()));
        }
        self.published.lock().push(event.clone());

        let mut held = self.held.lock();
        match held.as_mut() {
            Some(queue) => queue.push(event.clone()),
            None => {
                let _ = self.tx.send(event.clone());
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[ChangeTopic]) -> RepoResult<BoxStream<'static, ChangeEvent>> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(DomainError::BusError("subscribe refused".to_string()));
        }

        let rx = self.tx.subscribe();
        let topics: HashSet<ChangeTopic> = topics.iter().cloned().collect();

        Ok(stream::unfold((rx, topics), |(mut rx, topics)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if topics.contains(&event.topic()) => {
                        return Some((event, (rx, topics)))
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed())
    }
}
