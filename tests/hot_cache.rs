//! Hot-cache reconciliation: per-subject fast-lookup keys converge on
//! the most recent page-0 result.

mod support;

use std::time::Duration;

use veglia::infra::kv::KvBackend;

use support::harness;

#[tokio::test(start_paused = true)]
async fn page_zero_writes_hot_keys_with_the_long_ttl() {
    let harness = harness(&["a", "b", "c"]);
    harness.presence.set_online(&["a"]);

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("read succeeds");

    for key in ["hot:a", "hot:b", "hot:c"] {
        assert!(
            harness
                .backend
                .get(key)
                .await
                .expect("probe succeeds")
                .is_some(),
            "missing {key}"
        );
    }

    let remaining = harness
        .backend
        .ttl("hot:a")
        .await
        .expect("ttl probe succeeds")
        .expect("hot key has expiry");
    assert_eq!(remaining, Duration::from_secs(3600));

    let raw = harness
        .backend
        .get("hot:a")
        .await
        .expect("probe succeeds")
        .expect("hot key present");
    assert!(raw.contains("\"online\""));
    assert!(raw.contains("conn-a"));
}

#[tokio::test(start_paused = true)]
async fn unfollow_then_follow_converges_hot_keys() {
    let harness = harness(&["a", "b", "c"]);

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("warmup read succeeds");

    // The owner unfollows `a` and follows `d`; the change lands on the
    // next page-0 build, here triggered through the grace window.
    tokio::time::advance(Duration::from_secs(250)).await;
    harness.relationships.set_following(&["b", "c", "d"]);

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("stale read succeeds");
    harness.service.drain_background().await;

    assert!(harness
        .backend
        .get("hot:a")
        .await
        .expect("probe succeeds")
        .is_none());
    assert!(harness
        .backend
        .get("hot:d")
        .await
        .expect("probe succeeds")
        .is_some());

    let remaining = harness
        .backend
        .ttl("hot:d")
        .await
        .expect("ttl probe succeeds")
        .expect("hot key has expiry");
    assert_eq!(remaining, Duration::from_secs(3600));
}

#[tokio::test(start_paused = true)]
async fn refresh_overwrites_hot_entries_for_retained_subjects() {
    let harness = harness(&["a", "b"]);

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("warmup read succeeds");

    let before = harness
        .backend
        .get("hot:a")
        .await
        .expect("probe succeeds")
        .expect("hot key present");
    assert!(before.contains("\"offline\""));

    // The subject comes online before the grace-window refresh.
    tokio::time::advance(Duration::from_secs(250)).await;
    harness.presence.set_online(&["a"]);

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("stale read succeeds");
    harness.service.drain_background().await;

    let after = harness
        .backend
        .get("hot:a")
        .await
        .expect("probe succeeds")
        .expect("hot key present");
    assert!(after.contains("\"online\""));
}

#[tokio::test(start_paused = true)]
async fn invalidated_owner_still_gets_fresh_hot_keys() {
    let harness = harness(&["a", "b"]);

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("warmup read succeeds");

    harness.relationships.set_following(&["b", "d"]);
    harness
        .service
        .invalidate("u1")
        .await
        .expect("invalidate succeeds");

    harness
        .service
        .get_following_status("u1", 0, 20)
        .await
        .expect("refetch succeeds");

    // New subjects get keys right away. The departed subject's key has
    // no diff base after invalidation and ages out on its own TTL.
    assert!(harness
        .backend
        .get("hot:d")
        .await
        .expect("probe succeeds")
        .is_some());
    assert!(harness
        .backend
        .get("hot:b")
        .await
        .expect("probe succeeds")
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn non_zero_pages_leave_the_hot_cache_alone() {
    let harness = harness(&["a", "b", "c", "d"]);

    harness
        .service
        .get_following_status("u1", 1, 2)
        .await
        .expect("page 1 read succeeds");

    for key in ["hot:a", "hot:b", "hot:c", "hot:d"] {
        assert!(
            harness
                .backend
                .get(key)
                .await
                .expect("probe succeeds")
                .is_none(),
            "{key} should not exist"
        );
    }
}
