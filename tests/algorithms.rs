//! Integration tests for rate limiting algorithms, exercised through the
//! [`Throttle`] façade end-to-end (scenarios S1-S3 from the design notes).

use std::time::Duration;

use throttle_core::{AlgorithmKind, MemoryStore, Quota, Store, Throttle};

fn memory() -> Store {
    Store::Memory(MemoryStore::new())
}

#[tokio::test]
async fn gcra_admits_burst_then_denies() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::Gcra)
        .quota(Quota::per_second(5).with_burst(5))
        .key("test:user")
        .build();

    for i in 1..=5 {
        let decision = throttle.limit(None, None, None).await.unwrap();
        assert!(decision.is_allowed(), "request {i} should be allowed (burst)");
    }

    let decision = throttle.limit(None, None, None).await.unwrap();
    assert!(decision.is_denied(), "6th request should be denied");
    assert!(decision.retry_after > Duration::ZERO);
}

#[tokio::test]
async fn separate_keys_are_independent() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::Gcra)
        .quota(Quota::per_second(2).with_burst(2))
        .build();

    for _ in 0..2 {
        throttle.limit(Some("user:1"), None, None).await.unwrap();
    }
    let decision = throttle.limit(Some("user:1"), None, None).await.unwrap();
    assert!(decision.is_denied(), "user:1 should be rate limited");

    let decision = throttle.limit(Some("user:2"), None, None).await.unwrap();
    assert!(decision.is_allowed(), "user:2 should still have quota");
}

#[tokio::test]
async fn s1_fixed_window_admits_then_denies_with_remaining_countdown() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::FixedWindow)
        .quota(Quota::per_minute(5))
        .key("s1")
        .build();

    for expected_remaining in (0..5).rev() {
        let decision = throttle.limit(None, None, None).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.remaining, expected_remaining);
    }

    let decision = throttle.limit(None, None, None).await.unwrap();
    assert!(decision.is_denied());
    assert_eq!(decision.remaining, 0);
    assert_eq!(decision.retry_after, decision.reset_after);
}

#[tokio::test]
async fn s2_token_bucket_refills_between_calls() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::TokenBucket)
        .quota(Quota::per_second(60).with_burst(10))
        .key("s2")
        .build();

    let decision = throttle.limit(None, Some(1), None).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, 9);

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let decision = throttle.limit(None, Some(5), None).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, 5);

    let decision = throttle.limit(None, Some(5), None).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, 0);

    let decision = throttle.limit(None, Some(1), None).await.unwrap();
    assert!(decision.is_denied());
}

#[tokio::test]
async fn s3_gcra_tracks_emission_interval() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::Gcra)
        .quota(Quota::per_minute(60).with_burst(10))
        .key("s3")
        .build();

    let decision = throttle.limit(None, None, None).await.unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining, 9);

    for _ in 0..9 {
        assert!(throttle.limit(None, None, None).await.unwrap().is_allowed());
    }

    let decision = throttle.limit(None, None, None).await.unwrap();
    assert!(decision.is_denied());
    assert!(decision.reset_after >= Duration::from_secs(9));
}

#[tokio::test]
async fn leaking_bucket_admits_up_to_capacity_then_drains() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::LeakingBucket)
        .quota(Quota::per_second(10).with_burst(3))
        .key("leak")
        .build();

    for i in 1..=3 {
        assert!(throttle.limit(None, None, None).await.unwrap().is_allowed(), "request {i}");
    }
    assert!(throttle.limit(None, None, None).await.unwrap().is_denied());
}

#[tokio::test]
async fn sliding_window_blends_previous_period() {
    let throttle = Throttle::builder(memory())
        .algorithm(AlgorithmKind::SlidingWindow)
        .quota(Quota::per_minute(10))
        .key("sliding")
        .build();

    for _ in 0..10 {
        assert!(throttle.limit(None, None, None).await.unwrap().is_allowed());
    }
    assert!(throttle.limit(None, None, None).await.unwrap().is_denied());
}

#[tokio::test]
async fn peek_does_not_mutate_any_algorithm_state() {
    for kind in [
        AlgorithmKind::FixedWindow,
        AlgorithmKind::SlidingWindow,
        AlgorithmKind::TokenBucket,
        AlgorithmKind::LeakingBucket,
        AlgorithmKind::Gcra,
    ] {
        let throttle = Throttle::builder(memory())
            .algorithm(kind)
            .quota(Quota::per_minute(10))
            .key("peek")
            .build();

        throttle.limit(None, None, None).await.unwrap();
        let before = throttle.peek(None).await.unwrap();
        let after = throttle.peek(None).await.unwrap();
        assert_eq!(before.remaining, after.remaining, "{kind:?} peek should be idempotent");
    }
}
