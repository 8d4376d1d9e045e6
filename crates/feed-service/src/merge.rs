//! Event merge
//!
//! [`Feed`] is the canonical in-memory feed. It keeps, per post, the
//! authoritative reaction flag and count as last reported by the store, and
//! layers the [`MutationTracker`]'s pending intents on top when producing
//! what the user sees.
//!
//! Change events are applied in arrival order. The posts topic and the
//! reactions topic are independent, so a reaction may be reported before
//! the post it belongs to; such reactions are held until the post arrives.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use feed_core::{is_live, ChangeEvent, Post, PostId, UserId};

use crate::store::ReactionReceipt;
use crate::tracker::{MutationTracker, Ticket};

#[derive(Debug, Clone)]
struct FeedItem {
    /// `reaction_count` is the authoritative count
    post: Post,
    /// Authoritative "current user reacted"
    reacted: bool,
    /// Whether `post.reaction_count` already includes the current user;
    /// only consulted while a reaction intent is pending
    counted: bool,
    /// Local placeholder still waiting for the store
    publishing: bool,
}

impl FeedItem {
    fn stored(post: Post, reacted: bool) -> Self {
        Self {
            post,
            reacted,
            counted: reacted,
            publishing: false,
        }
    }
}

/// One row of the visible feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Post with the visible reaction count
    pub post: Post,
    pub user_reacted: bool,
    /// A reaction toggle is still awaiting confirmation
    pub pending: bool,
    /// The post itself has not been stored yet
    pub publishing: bool,
}

/// Canonical feed for one user
#[derive(Debug)]
pub struct Feed {
    user_id: UserId,
    items: Vec<FeedItem>,
    tracker: MutationTracker,
    /// Reaction outcomes seen before their post
    early: HashMap<PostId, bool>,
}

impl Feed {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            tracker: MutationTracker::new(),
            early: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn tracker(&self) -> &MutationTracker {
        &self.tracker
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, post_id: &PostId) -> bool {
        self.position(post_id).is_some()
    }

    fn position(&self, post_id: &PostId) -> Option<usize> {
        self.items.iter().position(|item| &item.post.id == post_id)
    }

    fn item_mut(&mut self, post_id: &PostId) -> Option<&mut FeedItem> {
        self.items.iter_mut().find(|item| &item.post.id == post_id)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Replace the feed with a freshly fetched snapshot
    ///
    /// Pending reaction intents are dropped; placeholders for posts still
    /// being published stay on top.
    pub fn replace_snapshot(&mut self, posts: Vec<Post>, reacted_ids: &HashSet<PostId>) {
        let placeholders: Vec<FeedItem> = self.items.drain(..).filter(|i| i.publishing).collect();

        self.items = placeholders
            .into_iter()
            .chain(posts.into_iter().map(|post| {
                let reacted = reacted_ids.contains(&post.id);
                FeedItem::stored(post, reacted)
            }))
            .collect();

        self.tracker.clear_reactions();
        self.early.clear();
    }

    /// Drop posts no longer live at `now`
    pub fn retain_live(&mut self, now: DateTime<Utc>) -> Vec<PostId> {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            let keep = is_live(&item.post, now);
            if !keep {
                removed.push(item.post.id.clone());
            }
            keep
        });
        for id in &removed {
            self.tracker.resolve(id);
        }
        removed
    }

    // =========================================================================
    // Change events
    // =========================================================================

    /// Merge one change event; returns whether the feed changed
    pub fn apply(&mut self, event: ChangeEvent) -> bool {
        match event {
            ChangeEvent::PostInserted(post) => {
                if self.contains(&post.id) {
                    debug!(post_id = %post.id, "Ignoring duplicate insert");
                    return false;
                }
                let reacted = self.early.remove(&post.id).unwrap_or(false);
                self.items.insert(0, FeedItem::stored(post, reacted));
                true
            }
            ChangeEvent::PostUpdated(post) => {
                let Some(item) = self.item_mut(&post.id) else {
                    return false;
                };
                item.post.reaction_count = post.reaction_count;
                // The pushed count reflects the last reaction the store
                // reported for this user
                item.counted = item.reacted;
                true
            }
            ChangeEvent::PostDeleted { id } => {
                self.tracker.resolve(&id);
                self.early.remove(&id);
                match self.position(&id) {
                    Some(pos) => {
                        self.items.remove(pos);
                        true
                    }
                    None => false,
                }
            }
            ChangeEvent::ReactionInserted(reaction) => {
                self.apply_reaction(&reaction.post_id, &reaction.user_id, true)
            }
            ChangeEvent::ReactionDeleted { post_id, user_id } => {
                self.apply_reaction(&post_id, &user_id, false)
            }
        }
    }

    fn apply_reaction(&mut self, post_id: &PostId, user_id: &UserId, reacted: bool) -> bool {
        if user_id != &self.user_id {
            return false;
        }

        match self.item_mut(post_id) {
            Some(item) => item.reacted = reacted,
            None => {
                self.early.insert(post_id.clone(), reacted);
            }
        }

        if self.tracker.confirm(post_id, reacted) {
            debug!(post_id = %post_id, reacted, "Pending reaction confirmed");
        } else if self.tracker.is_pending(post_id) {
            debug!(post_id = %post_id, reacted, "Stale reaction confirmation, intent kept");
        }
        true
    }

    // =========================================================================
    // Local mutations
    // =========================================================================

    /// Flip the visible reaction on `post_id`
    ///
    /// Returns the ticket and the requested state, or `None` if the post is
    /// not in the feed or still being published.
    pub fn begin_reaction(&mut self, post_id: &PostId) -> Option<(Ticket, bool)> {
        let was_pending = self.tracker.is_pending(post_id);
        let item = self.items.iter_mut().find(|item| &item.post.id == post_id)?;
        if item.publishing {
            return None;
        }
        // With nothing in flight the shown count is the stored one, so it
        // is taken to include the user exactly when the flag says so
        if !was_pending {
            item.counted = item.reacted;
        }
        let desired = !self.tracker.effective_reacted(post_id, item.reacted);
        Some((self.tracker.begin(post_id.clone(), desired), desired))
    }

    /// Record the store's answer to a reaction write
    pub fn apply_receipt(&mut self, receipt: &ReactionReceipt, ticket: Ticket) -> bool {
        if let Some(item) = self.item_mut(&receipt.post_id) {
            item.reacted = receipt.reacted;
            item.counted = receipt.reacted;
            item.post.reaction_count = receipt.reaction_count;
        }
        self.tracker.resolve_ticket(&receipt.post_id, ticket)
    }

    /// Undo an optimistic toggle that failed for good
    pub fn rollback(&mut self, post_id: &PostId, ticket: Ticket) -> bool {
        self.tracker.resolve_ticket(post_id, ticket)
    }

    /// Show a post that is still being stored
    pub fn add_placeholder(&mut self, post: Post) {
        self.tracker.begin_post(post.id.clone());
        self.items.insert(
            0,
            FeedItem {
                post,
                reacted: false,
                counted: false,
                publishing: true,
            },
        );
    }

    /// Swap a placeholder for the stored post
    ///
    /// If the stored post already arrived as an event, the placeholder just
    /// disappears.
    pub fn confirm_placeholder(&mut self, local_id: &PostId, stored: Post) {
        self.tracker.finish_post(local_id);
        let pos = self.position(local_id);
        if let Some(pos) = pos {
            self.items.remove(pos);
        }
        if !self.contains(&stored.id) {
            let reacted = self.early.remove(&stored.id).unwrap_or(false);
            self.items
                .insert(pos.unwrap_or(0), FeedItem::stored(stored, reacted));
        }
    }

    /// Remove a placeholder whose post could not be stored
    pub fn discard_placeholder(&mut self, local_id: &PostId) -> bool {
        self.tracker.finish_post(local_id);
        match self.position(local_id) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Randomise display order
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.items.shuffle(rng);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn entry_for(&self, item: &FeedItem) -> FeedEntry {
        let id = &item.post.id;
        let user_reacted = self.tracker.effective_reacted(id, item.reacted);
        let pending = self.tracker.is_pending(id);

        // Counts only diverge from the store while a toggle is unresolved
        let mut post = item.post.clone();
        if pending {
            post.reaction_count = match (user_reacted, item.counted) {
                (true, false) => post.reaction_count.saturating_add(1),
                (false, true) => post.reaction_count.saturating_sub(1),
                _ => post.reaction_count,
            };
        }

        FeedEntry {
            post,
            user_reacted,
            pending,
            publishing: item.publishing,
        }
    }

    /// Visible feed, in display order
    pub fn entries(&self) -> Vec<FeedEntry> {
        self.items.iter().map(|item| self.entry_for(item)).collect()
    }

    pub fn entry(&self, post_id: &PostId) -> Option<FeedEntry> {
        self.items
            .iter()
            .find(|item| &item.post.id == post_id)
            .map(|item| self.entry_for(item))
    }
}

/// Pure form of [`Feed::apply`]
#[must_use]
pub fn reduce(mut feed: Feed, event: ChangeEvent) -> Feed {
    feed.apply(event);
    feed
}
