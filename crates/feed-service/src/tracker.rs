//! Optimistic mutation tracker
//!
//! Records which local writes are still in flight. A reaction toggle is
//! pending from the moment the user flips it until one of:
//!
//! - the store's receipt for the *latest* toggle arrives,
//! - a reaction change event confirming the same direction arrives,
//! - the request fails definitively and the flip is rolled back.
//!
//! Each toggle is stamped with a [`Ticket`]; results for an older ticket
//! never resolve a newer intent.

use std::collections::{HashMap, HashSet};

use feed_core::PostId;

/// Identifies one optimistic reaction toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Per-post reaction state as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionIntent {
    /// Nothing in flight; the authoritative flag is shown
    Idle,
    /// The user asked for `desired` and the store has not answered yet
    Pending { desired: bool, ticket: Ticket },
}

impl ReactionIntent {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Tracks pending reaction toggles and posts being published
#[derive(Debug, Default)]
pub struct MutationTracker {
    next_ticket: u64,
    reactions: HashMap<PostId, (bool, Ticket)>,
    publishing: HashSet<PostId>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// Record that the user wants `desired` on `post_id`
    ///
    /// Supersedes any toggle already in flight for the same post.
    pub fn begin(&mut self, post_id: PostId, desired: bool) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.reactions.insert(post_id, (desired, ticket));
        ticket
    }

    /// Current state for `post_id`
    pub fn state(&self, post_id: &PostId) -> ReactionIntent {
        match self.reactions.get(post_id) {
            Some(&(desired, ticket)) => ReactionIntent::Pending { desired, ticket },
            None => ReactionIntent::Idle,
        }
    }

    pub fn is_pending(&self, post_id: &PostId) -> bool {
        self.reactions.contains_key(post_id)
    }

    /// Check whether `ticket` is still the latest toggle for `post_id`
    pub fn is_current(&self, post_id: &PostId, ticket: Ticket) -> bool {
        matches!(self.reactions.get(post_id), Some(&(_, t)) if t == ticket)
    }

    /// Drop whatever is pending for `post_id`
    pub fn resolve(&mut self, post_id: &PostId) -> bool {
        self.reactions.remove(post_id).is_some()
    }

    /// Drop the pending toggle only if it is still `ticket`
    pub fn resolve_ticket(&mut self, post_id: &PostId, ticket: Ticket) -> bool {
        if self.is_current(post_id, ticket) {
            self.reactions.remove(post_id);
            true
        } else {
            false
        }
    }

    /// Resolve on an authoritative reaction change, if it matches the intent
    ///
    /// A change in the other direction is a stale echo of an earlier toggle
    /// and leaves the intent in place.
    pub fn confirm(&mut self, post_id: &PostId, reacted: bool) -> bool {
        match self.reactions.get(post_id) {
            Some(&(desired, _)) if desired == reacted => {
                self.reactions.remove(post_id);
                true
            }
            _ => false,
        }
    }

    /// What the user should see: the intent if pending, else `authoritative`
    pub fn effective_reacted(&self, post_id: &PostId, authoritative: bool) -> bool {
        self.reactions
            .get(post_id)
            .map_or(authoritative, |&(desired, _)| desired)
    }

    /// Forget every pending toggle
    pub fn clear_reactions(&mut self) {
        self.reactions.clear();
    }

    pub fn pending_reactions(&self) -> usize {
        self.reactions.len()
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Mark a locally created post as awaiting the store
    pub fn begin_post(&mut self, local_id: PostId) {
        self.publishing.insert(local_id);
    }

    pub fn finish_post(&mut self, local_id: &PostId) -> bool {
        self.publishing.remove(local_id)
    }

    pub fn is_publishing(&self, post_id: &PostId) -> bool {
        self.publishing.contains(post_id)
    }
}
