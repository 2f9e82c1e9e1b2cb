// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gated behind `IDS_REDIS_TESTS=1` against a real Redis instance (default
//! `redis://127.0.0.1/`, override with `REDIS_URL`). Exercises the same
//! semantics as `store::memory::tests` against the live backend.
//!
//! Run: `IDS_REDIS_TESTS=1 cargo test -p ids-core --lib store::redis`

use super::*;

macro_rules! skip_unless_redis {
    () => {
        if std::env::var("IDS_REDIS_TESTS").as_deref() != Ok("1") {
            eprintln!("skipping redis test (set IDS_REDIS_TESTS=1 to enable)");
            return;
        }
    };
}

async fn connect() -> RedisStateStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_owned());
    RedisStateStore::new(&url).await.expect("connect to redis")
}

#[tokio::test]
async fn window_record_counts_and_evicts_outside_window() {
    skip_unless_redis!();
    let store = connect().await;
    let key = format!("test:{}", uuid::Uuid::new_v4());

    let (count, _) = store
        .window_record(&key, 100, 60, "evt-1", &"blob-1".to_owned(), 50)
        .await
        .expect("record");
    assert_eq!(count, 1);

    let (count, events) = store
        .window_record(&key, 170, 60, "evt-2", &"blob-2".to_owned(), 50)
        .await
        .expect("record");
    assert_eq!(count, 1, "evt-1 should have been evicted by score range");
    assert_eq!(events, vec!["blob-2".to_owned()]);
}

#[tokio::test]
async fn cooldown_hit_suppresses_within_window_and_permits_after() {
    skip_unless_redis!();
    let store = connect().await;
    let key = format!("test:{}", uuid::Uuid::new_v4());

    assert!(store.cooldown_hit(&key, 2, 1_000).await.expect("first fire permits"));
    assert!(!store.cooldown_hit(&key, 2, 1_001).await.expect("inside cooldown suppresses"));
}

#[tokio::test]
async fn fail_burst_threshold_over_redis() {
    skip_unless_redis!();
    let store = connect().await;
    let key = format!("test:{}", uuid::Uuid::new_v4());

    for (i, ts) in [100, 110, 120].into_iter().enumerate() {
        store.record_fail(&key, ts, &format!("evt-{i}"), 60).await.expect("record fail");
    }
    assert!(store.had_recent_fail_burst(&key, 125, 60, 3).await.expect("burst check"));
    assert!(!store.had_recent_fail_burst(&key, 125, 60, 5).await.expect("burst check"));
}

#[tokio::test]
async fn fail_burst_counts_distinct_members_sharing_a_timestamp_over_redis() {
    skip_unless_redis!();
    let store = connect().await;
    let key = format!("test:{}", uuid::Uuid::new_v4());

    for i in 0..5 {
        store.record_fail(&key, 100, &format!("evt-{i}"), 60).await.expect("record fail");
    }
    assert!(store.had_recent_fail_burst(&key, 100, 60, 5).await.expect("burst check"));
}
