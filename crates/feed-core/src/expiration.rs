//! Post lifetime rules
//!
//! Every post lives for exactly [`post_ttl`] after creation. A post is live
//! while `now < expires_at`; expired posts are filtered out of every view.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::entities::Post;

/// Time-to-live of a post, in hours
pub const POST_TTL_HOURS: i64 = 24;

/// Time-to-live of a post
#[inline]
pub fn post_ttl() -> Duration {
    Duration::hours(POST_TTL_HOURS)
}

/// Compute the expiry instant for a post created at `created_at`
#[inline]
pub fn expires_at_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + post_ttl()
}

/// Check whether a post is still visible at `now`
#[inline]
pub fn is_live(post: &Post, now: DateTime<Utc>) -> bool {
    now < post.expires_at
}

/// Keep only live posts, preserving their relative order
pub fn filter_live<I>(posts: I, now: DateTime<Utc>) -> Vec<Post>
where
    I: IntoIterator<Item = Post>,
{
    posts.into_iter().filter(|post| is_live(post, now)).collect()
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Stored as milliseconds since the Unix epoch so it can be shared between
/// tasks without locking.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
