//! Feed synchronisation tests
//!
//! Several controllers share one in-memory backend and change bus; these
//! tests check how local writes, pushed changes and optimistic state merge.
//!
//! Run with: cargo test -p integration-tests --test feed_sync_tests

use std::sync::Arc;

use feed_core::{ChangeEvent, ChangeTopic, Clock, Post, PostId, Reaction};
use integration_tests::{unique_user, visible, wait_for, TestBackend};

fn has_post(id: &PostId) -> impl Fn(&[feed_service::FeedEntry]) -> bool + '_ {
    move |feed| feed.iter().any(|entry| &entry.post.id == id)
}

// ============================================================================
// Propagation
// ============================================================================

#[tokio::test]
async fn test_post_propagates_to_other_client() {
    let tb = TestBackend::new();
    let alice = tb.started(unique_user()).await.unwrap();
    let bob = tb.started(unique_user()).await.unwrap();

    let post = alice.create_post("うんこ").await.unwrap();
    wait_for(&bob, has_post(&post.id)).await.unwrap();

    // Alice's own echo must not duplicate the post
    tb.settle(&alice).await.unwrap();
    let ids: Vec<_> = alice.feed().into_iter().map(|e| e.post.id).collect();
    assert_eq!(ids, vec![post.id]);
}

#[tokio::test]
async fn test_reaction_count_reaches_other_client() {
    let tb = TestBackend::new();
    let alice = tb.started(unique_user()).await.unwrap();
    let bob = tb.started(unique_user()).await.unwrap();

    let post = alice.create_post("hello").await.unwrap();
    wait_for(&bob, has_post(&post.id)).await.unwrap();

    bob.toggle_reaction(&post.id).await.unwrap();
    assert_eq!(visible(&bob, &post.id), Some((true, 1)));

    // Alice sees the count but not Bob's flag
    wait_for(&alice, |feed| {
        feed.iter()
            .any(|e| e.post.id == post.id && e.post.reaction_count == 1)
    })
    .await
    .unwrap();
    assert_eq!(visible(&alice, &post.id), Some((false, 1)));
}

#[tokio::test]
async fn test_duplicate_insert_event_leaves_feed_unchanged() {
    let tb = TestBackend::new();
    let alice = tb.started(unique_user()).await.unwrap();

    let post = alice.create_post("once").await.unwrap();
    alice.toggle_reaction(&post.id).await.unwrap();
    tb.settle(&alice).await.unwrap();
    let before = alice.feed();

    let mut replay = post.clone();
    replay.reaction_count = 0;
    tb.bus.inject(ChangeEvent::PostInserted(replay));
    tb.settle(&alice).await.unwrap();

    assert_eq!(alice.feed(), before);
}

#[tokio::test]
async fn test_delete_event_removes_post() {
    let tb = TestBackend::new();
    let alice = tb.started(unique_user()).await.unwrap();
    let post = alice.create_post("short lived").await.unwrap();

    tb.backend.remove_post(&post.id);
    tb.bus.inject(ChangeEvent::PostDeleted {
        id: post.id.clone(),
    });

    wait_for(&alice, |feed| feed.is_empty()).await.unwrap();
}

#[tokio::test]
async fn test_reaction_event_before_post_event() {
    let tb = TestBackend::new();
    let user = unique_user();
    let alice = tb.started(user.clone()).await.unwrap();

    // Posted from another device; the reaction echo overtakes the insert
    let mut post = Post::new("from elsewhere", tb.clock.now()).unwrap();
    post.reaction_count = 1;
    tb.bus.inject(ChangeEvent::ReactionInserted(Reaction::new(
        post.id.clone(),
        user,
        tb.clock.now(),
    )));
    tb.bus.inject(ChangeEvent::PostInserted(post.clone()));

    wait_for(&alice, has_post(&post.id)).await.unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));
}

#[tokio::test]
async fn test_count_update_overtakes_own_reaction_from_other_device() {
    let tb = TestBackend::new();
    let user = unique_user();
    let alice = tb.started(user.clone()).await.unwrap();
    let phone = tb.started(user).await.unwrap();
    let bob = tb.started(unique_user()).await.unwrap();

    let post = bob.create_post("seen twice").await.unwrap();
    wait_for(&alice, has_post(&post.id)).await.unwrap();
    wait_for(&phone, has_post(&post.id)).await.unwrap();

    // Reacting from the phone: the posts channel is delivered first
    tb.bus.hold();
    phone.toggle_reaction(&post.id).await.unwrap();
    assert_eq!(tb.bus.release_topic(&ChangeTopic::Posts), 1);
    wait_for(&alice, |feed| {
        feed.iter()
            .any(|e| e.post.id == post.id && e.post.reaction_count == 1)
    })
    .await
    .unwrap();
    assert_eq!(visible(&alice, &post.id), Some((false, 1)));

    assert_eq!(tb.bus.release(), 1);
    wait_for(&alice, |feed| feed.iter().any(|e| e.post.id == post.id && e.user_reacted))
        .await
        .unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));

    // Same for the removal
    tb.bus.hold();
    phone.toggle_reaction(&post.id).await.unwrap();
    assert_eq!(tb.bus.release_topic(&ChangeTopic::Posts), 1);
    wait_for(&alice, |feed| {
        feed.iter()
            .any(|e| e.post.id == post.id && e.post.reaction_count == 0)
    })
    .await
    .unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 0)));

    assert_eq!(tb.bus.release(), 1);
    tb.settle(&alice).await.unwrap();
    assert_eq!(visible(&alice, &post.id), Some((false, 0)));
    assert!(!alice.entry(&post.id).unwrap().pending);
}

// ============================================================================
// Optimistic reactions
// ============================================================================

#[tokio::test]
async fn test_pending_reaction_confirmed_by_event() {
    let tb = TestBackend::new();
    let user = unique_user();
    let alice = Arc::new(tb.started(user.clone()).await.unwrap());
    let post = alice.create_post("confirm me").await.unwrap();

    tb.backend.pause_reactions();
    let task = tokio::spawn({
        let alice = alice.clone();
        let id = post.id.clone();
        async move { alice.toggle_reaction(&id).await }
    });

    let feed = wait_for(&alice, |feed| feed.iter().any(|e| e.pending)).await.unwrap();
    assert!(feed[0].user_reacted);
    assert_eq!(feed[0].post.reaction_count, 1);

    // Confirmation arrives before the write returns
    tb.bus.inject(ChangeEvent::ReactionInserted(Reaction::new(
        post.id.clone(),
        user,
        tb.clock.now(),
    )));
    let feed = wait_for(&alice, |feed| feed.iter().all(|e| !e.pending)).await.unwrap();
    assert!(feed[0].user_reacted);

    tb.backend.resume_reactions();
    task.await.unwrap().unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));
}

#[tokio::test]
async fn test_late_confirmation_keeps_newer_intent() {
    let tb = TestBackend::new();
    let user = unique_user();
    let alice = Arc::new(tb.started(user.clone()).await.unwrap());
    let post = alice.create_post("flip flop").await.unwrap();
    tb.settle(&alice).await.unwrap();

    // First toggle lands, but its echoes are delayed
    tb.bus.hold();
    alice.toggle_reaction(&post.id).await.unwrap();
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));

    // Second toggle is in flight when the echoes finally arrive
    tb.backend.pause_reactions();
    let task = tokio::spawn({
        let alice = alice.clone();
        let id = post.id.clone();
        async move { alice.toggle_reaction(&id).await }
    });
    wait_for(&alice, |feed| feed.iter().any(|e| e.pending && !e.user_reacted))
        .await
        .unwrap();

    assert!(tb.bus.release() >= 2);
    tb.settle(&alice).await.unwrap();
    let entry = alice.entry(&post.id).unwrap();
    assert!(entry.pending);
    assert!(!entry.user_reacted);
    assert_eq!(entry.post.reaction_count, 0);

    tb.backend.resume_reactions();
    task.await.unwrap().unwrap();
    tb.settle(&alice).await.unwrap();

    assert_eq!(visible(&alice, &post.id), Some((false, 0)));
    assert!(!tb.backend.has_reaction(&post.id, &user));
}

#[tokio::test]
async fn test_double_toggle_returns_to_original() {
    let tb = TestBackend::new();
    let alice = tb.started(unique_user()).await.unwrap();
    let bob = tb.started(unique_user()).await.unwrap();

    let post = bob.create_post("popular").await.unwrap();
    bob.toggle_reaction(&post.id).await.unwrap();
    wait_for(&alice, |feed| {
        feed.iter()
            .any(|e| e.post.id == post.id && e.post.reaction_count == 1)
    })
    .await
    .unwrap();
    let original = visible(&alice, &post.id);
    assert_eq!(original, Some((false, 1)));

    let (first, second) = tokio::join!(
        alice.toggle_reaction(&post.id),
        alice.toggle_reaction(&post.id)
    );
    first.unwrap();
    second.unwrap();
    tb.settle(&alice).await.unwrap();

    assert_eq!(visible(&alice, &post.id), original);
    assert_eq!(tb.backend.post(&post.id).unwrap().reaction_count, 1);
}

#[tokio::test]
async fn test_superseded_toggle_skips_store_call() {
    let tb = TestBackend::new();
    let alice = Arc::new(tb.started(unique_user()).await.unwrap());
    let post = alice.create_post("queue").await.unwrap();

    tb.backend.pause_reactions();
    let spawn_toggle = |expect_reacted: bool| {
        let alice = alice.clone();
        let id = post.id.clone();
        let task = tokio::spawn(async move { alice.toggle_reaction(&id).await });
        (task, expect_reacted)
    };

    let mut tasks = Vec::new();
    for expect in [true, false, true] {
        let (task, expect_reacted) = spawn_toggle(expect);
        wait_for(&alice, |feed| feed[0].user_reacted == expect_reacted)
            .await
            .unwrap();
        tasks.push(task);
    }

    tb.backend.resume_reactions();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // First and last toggles reached the store; the middle one was replaced
    assert_eq!(tb.backend.reaction_writes(), 2);
    assert_eq!(visible(&alice, &post.id), Some((true, 1)));
}

// ============================================================================
// Shuffle
// ============================================================================

#[tokio::test]
async fn test_shuffle_preserves_posts_counts_and_flags() {
    let tb = TestBackend::new();
    let alice = tb.started(unique_user()).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(alice.create_post(&format!("post {i}")).await.unwrap().id);
    }
    for id in ids.iter().step_by(3) {
        alice.toggle_reaction(id).await.unwrap();
    }
    tb.settle(&alice).await.unwrap();

    let writes = tb.backend.reaction_writes();
    let mut before = alice.feed();
    alice.shuffle();
    let mut after = alice.feed();

    before.sort_by(|a, b| a.post.id.cmp(&b.post.id));
    after.sort_by(|a, b| a.post.id.cmp(&b.post.id));
    assert_eq!(before, after);
    assert_eq!(tb.backend.reaction_writes(), writes);
}
