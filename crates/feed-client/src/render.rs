//! Terminal rendering of the feed

use chrono::{DateTime, Utc};
use std::fmt::Write;

use feed_service::FeedEntry;

/// Age of a post, coarsened for display
pub fn relative_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if minutes < 1440 {
        format!("{} h ago", minutes / 60)
    } else {
        format!("{} d ago", minutes / 1440)
    }
}

/// Time left before a post disappears
pub fn time_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (expires_at - now).num_minutes().max(0);
    if minutes < 60 {
        format!("{minutes} min left")
    } else {
        format!("{} h left", minutes / 60)
    }
}

/// Render the feed as numbered lines
pub fn render_feed(entries: &[FeedEntry], now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return "(no posts yet)".to_string();
    }

    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let heart = if entry.user_reacted { "♥" } else { "♡" };
        let _ = write!(
            out,
            "[{}] {}\n    {heart} {}  ·  {}  ·  {}",
            i + 1,
            entry.post.content,
            entry.post.reaction_count,
            relative_time(entry.post.created_at, now),
            time_left(entry.post.expires_at, now),
        );
        if entry.publishing {
            out.push_str("  ·  publishing…");
        } else if entry.pending {
            out.push_str("  ·  syncing…");
        }
        out.push('\n');
    }
    out
}
