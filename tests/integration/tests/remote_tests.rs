//! Remote store tests against real services
//!
//! These tests require:
//! - Running PostgreSQL instance
//! - Running Redis instance
//! - Environment variables: DATABASE_URL, REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test remote_tests

use feed_core::SessionProvider;
use feed_service::StoreMode;
use integration_tests::{check_test_env, remote_context, unique_user, visible, wait_for};

#[tokio::test]
async fn test_remote_context_selects_remote_store() {
    if !check_test_env().await {
        return;
    }

    let ctx = remote_context().await.expect("Failed to connect");
    assert_eq!(ctx.store().mode(), StoreMode::Remote);

    let user = ctx.session().current_user_id().await.unwrap();
    assert_eq!(ctx.session().current_user_id().await.unwrap(), user);
}

#[tokio::test]
async fn test_post_and_reaction_round_trip() {
    if !check_test_env().await {
        return;
    }

    let ctx = remote_context().await.expect("Failed to connect");
    let alice = ctx.controller(unique_user());
    alice.load_initial().await.unwrap();

    let post = alice.create_post("うんこ").await.unwrap();
    assert_eq!(post.expires_at - post.created_at, chrono::Duration::hours(24));

    alice.toggle_reaction(&post.id).await.unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));

    alice.load_initial().await.unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));

    alice.toggle_reaction(&post.id).await.unwrap();
    alice.load_initial().await.unwrap();
    assert_eq!(visible(&alice, &post.id), Some((false, 0)));
}

#[tokio::test]
async fn test_changes_pushed_between_clients() {
    if !check_test_env().await {
        return;
    }

    let ctx = remote_context().await.expect("Failed to connect");
    let alice = ctx.controller(unique_user());
    let bob = ctx.controller(unique_user());
    for controller in [&alice, &bob] {
        controller.load_initial().await.unwrap();
        controller.start().await;
    }
    // Give the Redis subscriber time to confirm its channels
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let post = alice.create_post("hello from alice").await.unwrap();
    wait_for(&bob, |feed| feed.iter().any(|e| e.post.id == post.id))
        .await
        .unwrap();

    bob.toggle_reaction(&post.id).await.unwrap();
    wait_for(&alice, |feed| {
        feed.iter()
            .any(|e| e.post.id == post.id && e.post.reaction_count == 1)
    })
    .await
    .unwrap();
    assert_eq!(visible(&alice, &post.id), Some((false, 1)));

    alice.stop();
    bob.stop();
}
