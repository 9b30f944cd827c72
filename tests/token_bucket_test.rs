//! Token bucket behaviour against the in-process store

use floodgate::{BucketRule, Decision, StoreHandle, TokenBucketLimiter};
use std::sync::Arc;

fn limiter() -> TokenBucketLimiter {
    TokenBucketLimiter::new(StoreHandle::in_memory())
}

#[tokio::test]
async fn test_capacity_bound_without_time_passing() {
    let limiter = limiter();

    for capacity in [1.0, 3.0, 10.0] {
        let key = format!("capacity:{}", capacity);
        let mut allowed = 0;
        while limiter.allow(&key, 1_000, capacity, 1.0, 1.0, 60).await.unwrap() {
            allowed += 1;
            assert!(allowed <= capacity as usize, "bucket oversubscribed");
        }
        assert_eq!(allowed, capacity as usize);

        // Still empty while the clock stands still
        for _ in 0..5 {
            assert!(!limiter.allow(&key, 1_000, capacity, 1.0, 1.0, 60).await.unwrap());
        }
    }
}

#[tokio::test]
async fn test_refill_after_drain() {
    let limiter = limiter();
    // One token every 2 seconds
    let (capacity, rate) = (5.0, 0.5);

    for _ in 0..5 {
        assert!(limiter.allow("drained", 0, capacity, rate, 1.0, 60).await.unwrap());
    }
    assert!(!limiter.allow("drained", 0, capacity, rate, 1.0, 60).await.unwrap());

    // Half a token is not enough
    assert!(!limiter.allow("drained", 1, capacity, rate, 1.0, 60).await.unwrap());

    // The refill earned at t=1 was kept, so t=2 has exactly one token
    assert!(limiter.allow("drained", 2, capacity, rate, 1.0, 60).await.unwrap());
    assert!(!limiter.allow("drained", 2, capacity, rate, 1.0, 60).await.unwrap());
}

#[tokio::test]
async fn test_full_refill_takes_capacity_over_rate() {
    let limiter = limiter();
    let (capacity, rate) = (5.0, 0.5);

    for _ in 0..5 {
        limiter.allow("full", 0, capacity, rate, 1.0, 60).await.unwrap();
    }

    // capacity / rate = 10s later the bucket is full again, and no fuller
    let mut allowed = 0;
    while limiter.allow("full", 10, capacity, rate, 1.0, 60).await.unwrap() {
        allowed += 1;
    }
    assert_eq!(allowed, 5);
}

#[tokio::test]
async fn test_partial_refills_add_up_to_a_token() {
    let limiter = limiter();
    let rate = 1.0 / 60.0;

    assert!(limiter.allow("partial", 0, 1.0, rate, 1.0, 300).await.unwrap());
    // Each denial stores a third of a token
    assert!(!limiter.allow("partial", 20, 1.0, rate, 1.0, 300).await.unwrap());
    assert!(!limiter.allow("partial", 40, 1.0, rate, 1.0, 300).await.unwrap());
    assert!(limiter.allow("partial", 60, 1.0, rate, 1.0, 300).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_oversubscription_under_concurrency() {
    let limiter = Arc::new(limiter());
    let barrier = Arc::new(tokio::sync::Barrier::new(64));

    let mut handles = vec![];
    for _ in 0..64 {
        let limiter = limiter.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            limiter.allow("contended", 500, 1.0, 1.0, 1.0, 60).await.unwrap()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1, "exactly one caller may take the single token");
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let limiter = limiter();

    for _ in 0..3 {
        limiter.allow("key-a", 0, 3.0, 0.1, 1.0, 60).await.unwrap();
    }
    assert!(!limiter.allow("key-a", 0, 3.0, 0.1, 1.0, 60).await.unwrap());

    for _ in 0..3 {
        assert!(limiter.allow("key-b", 0, 3.0, 0.1, 1.0, 60).await.unwrap());
    }
}

#[tokio::test]
async fn test_five_per_minute_scenario() {
    let limiter = limiter();
    let rate = 1.0 / 60.0;

    let mut results = vec![];
    for _ in 0..6 {
        results.push(limiter.allow("signup:203.0.113.7", 0, 5.0, rate, 1.0, 300).await.unwrap());
    }
    assert_eq!(results, vec![true, true, true, true, true, false]);

    assert!(limiter.allow("signup:203.0.113.7", 60, 5.0, rate, 1.0, 300).await.unwrap());
}

#[tokio::test]
async fn test_check_with_rule() {
    let limiter = limiter();
    let rule = BucketRule::new(2, 1.0 / 60.0, 300).unwrap();

    assert_eq!(limiter.check_at("rule", &rule, 0, 1).await, Decision::Allowed);
    assert_eq!(limiter.check_at("rule", &rule, 0, 1).await, Decision::Allowed);
    assert_eq!(limiter.check_at("rule", &rule, 0, 1).await, Decision::Denied);
    assert_eq!(limiter.check_at("rule", &rule, 60, 1).await, Decision::Allowed);

    // Asking for more than remains is denied without consuming
    assert_eq!(limiter.check_at("rule", &rule, 180, 3).await, Decision::Denied);
    assert_eq!(limiter.check_at("rule", &rule, 180, 2).await, Decision::Allowed);
}
