//! Expiry tests
//!
//! Posts live for 24 hours. Both stores must stop showing them afterwards;
//! only the local store physically removes them.
//!
//! Run with: cargo test -p integration-tests --test expiry_tests

use chrono::Duration;
use std::time::Duration as StdDuration;

use feed_core::{Clock, KeyValueStore};
use feed_service::LOCAL_POSTS_KEY;
use integration_tests::{local_controller, t0, unique_user, wait_for, TestBackend};

#[tokio::test]
async fn test_post_gone_after_24_hours() {
    let tb = TestBackend::new();
    let alice = tb.controller(unique_user());

    let post = alice.create_post("うんこ").await.unwrap();
    assert_eq!(post.created_at, t0());
    assert_eq!(post.expires_at, t0() + Duration::hours(24));

    tb.clock.advance(Duration::hours(24) + Duration::seconds(1));
    let feed = alice.load_initial().await.unwrap();
    assert!(feed.iter().all(|e| e.post.id != post.id));

    // The shared store keeps the row; expiry is a read-side filter there
    assert_eq!(tb.backend.post_count(), 1);
    assert_eq!(alice.sweep().await.unwrap().removed, 0);
    assert_eq!(tb.backend.post_count(), 1);
}

#[tokio::test]
async fn test_post_visible_until_last_millisecond() {
    let tb = TestBackend::new();
    let alice = tb.controller(unique_user());
    let post = alice.create_post("almost gone").await.unwrap();

    tb.clock.set(post.expires_at - Duration::milliseconds(1));
    assert_eq!(alice.load_initial().await.unwrap().len(), 1);

    tb.clock.set(post.expires_at);
    assert!(alice.feed().is_empty());
    assert!(alice.load_initial().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_sweep_compacts_cache() {
    let (controller, kv, clock) = local_controller(unique_user());
    let old = controller.create_post("old news").await.unwrap();
    clock.advance(Duration::hours(20));
    let fresh = controller.create_post("fresh").await.unwrap();

    clock.advance(Duration::hours(5));
    let report = controller.sweep().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.retained, 1);

    let raw = kv.get(LOCAL_POSTS_KEY).await.unwrap().unwrap();
    assert!(!raw.contains(old.id.as_str()));
    assert!(raw.contains(fresh.id.as_str()));

    let ids: Vec<_> = controller.feed().into_iter().map(|e| e.post.id).collect();
    assert_eq!(ids, vec![fresh.id]);
}

#[tokio::test]
async fn test_load_sweeps_local_cache() {
    let (controller, kv, clock) = local_controller(unique_user());
    let post = controller.create_post("expiring").await.unwrap();

    clock.advance(Duration::hours(25));
    assert!(controller.load_initial().await.unwrap().is_empty());

    let raw = kv.get(LOCAL_POSTS_KEY).await.unwrap().unwrap();
    assert!(!raw.contains(post.id.as_str()));
}

#[tokio::test]
async fn test_periodic_sweep_runs_in_background() {
    let (controller, kv, clock) = local_controller(unique_user());
    let controller = controller.with_sweep_interval(StdDuration::from_millis(10));
    let post = controller.create_post("tick tock").await.unwrap();
    controller.start().await;

    clock.advance(Duration::hours(24));
    assert!(clock.now() >= post.expires_at);

    let compacted = tokio::time::timeout(StdDuration::from_secs(2), async {
        loop {
            let raw = kv.get(LOCAL_POSTS_KEY).await.unwrap().unwrap_or_default();
            if !raw.contains(post.id.as_str()) {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    })
    .await;
    assert!(compacted.is_ok(), "background sweep never compacted the cache");

    wait_for(&controller, |feed| feed.is_empty()).await.unwrap();
    controller.stop();
}
