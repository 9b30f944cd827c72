//! Behaviour when the shared store misbehaves

use async_trait::async_trait;
use floodgate::ratelimit::BucketRequest;
use floodgate::{
    BucketRule, CounterStore, Decision, FailedLoginTracker, FloodgateConfigBuilder, FloodgateError,
    LockoutPolicy, StoreHandle, TokenBucketLimiter,
};
use std::time::Duration;

/// Store that never answers
struct SilentStore;

#[async_trait]
impl CounterStore for SilentStore {
    async fn take_tokens(&self, _key: &str, _request: &BucketRequest) -> floodgate::Result<bool> {
        std::future::pending().await
    }

    async fn increment(&self, _key: &str, _window: Duration) -> floodgate::Result<i64> {
        std::future::pending().await
    }

    async fn counter(&self, _key: &str) -> floodgate::Result<Option<i64>> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> floodgate::Result<()> {
        std::future::pending().await
    }

    fn backend(&self) -> &'static str {
        "silent"
    }
}

/// Store that answers with garbage
struct GarbledStore;

#[async_trait]
impl CounterStore for GarbledStore {
    async fn take_tokens(&self, _key: &str, _request: &BucketRequest) -> floodgate::Result<bool> {
        Err(FloodgateError::store_protocol("unexpected reply"))
    }

    async fn increment(&self, _key: &str, _window: Duration) -> floodgate::Result<i64> {
        Err(FloodgateError::store_protocol("unexpected reply"))
    }

    async fn counter(&self, _key: &str) -> floodgate::Result<Option<i64>> {
        Err(FloodgateError::store_protocol("unexpected reply"))
    }

    async fn delete(&self, _key: &str) -> floodgate::Result<()> {
        Err(FloodgateError::store_protocol("unexpected reply"))
    }

    fn backend(&self) -> &'static str {
        "garbled"
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_degrades_instead_of_blocking() {
    let store = StoreHandle::new(SilentStore).with_timeout(Duration::from_millis(100));
    let limiter = TokenBucketLimiter::new(store);
    let rule = BucketRule::new(1, 1.0, 60).unwrap();

    for _ in 0..3 {
        match limiter.check("bucket", &rule).await {
            Decision::Degraded { reason } => {
                assert_eq!(reason, FloodgateError::StoreTimeout(Duration::from_millis(100)));
            }
            other => panic!("expected degraded decision, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_allow_surfaces_store_errors() {
    let limiter = TokenBucketLimiter::new(StoreHandle::new(GarbledStore));

    let err = limiter.allow("bucket", 0, 5.0, 1.0, 1.0, 60).await.unwrap_err();
    assert!(err.is_store_failure());
    assert!(matches!(err, FloodgateError::StoreProtocol(_)));
}

#[tokio::test]
async fn test_lockout_fails_open() {
    let tracker = FailedLoginTracker::new(StoreHandle::new(GarbledStore), LockoutPolicy::default());

    for _ in 0..10 {
        assert_eq!(tracker.increment("user@example.com", 900).await, 0);
    }
    assert!(!tracker.is_blocked("user@example.com", 1).await);
    assert!(!tracker.check("user@example.com").await.is_locked());
    tracker.clear("user@example.com").await;
}

#[tokio::test(start_paused = true)]
async fn test_lockout_timeout_fails_open() {
    let store = StoreHandle::new(SilentStore).with_timeout(Duration::from_millis(100));
    let tracker = FailedLoginTracker::new(store, LockoutPolicy::default());

    assert!(!tracker.record_failure("user@example.com").await.is_locked());
    assert!(!tracker.is_blocked("user@example.com", 1).await);
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_unreachable_redis_fails_open() {
    let config = FloodgateConfigBuilder::new()
        .with_redis_url("redis://127.0.0.1:1/")
        .with_store_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let store = StoreHandle::from_config(&config.store).unwrap();

    let limiter = TokenBucketLimiter::new(store.clone());
    let rule = BucketRule::new(1, 0.01, 60).unwrap();
    for _ in 0..3 {
        let decision = limiter.check("rl:tb:203.0.113.7", &rule).await;
        assert!(decision.is_allowed());
        assert!(decision.is_degraded());
    }

    let tracker = FailedLoginTracker::new(store.clone(), LockoutPolicy::default());
    assert_eq!(tracker.increment("user@example.com", 900).await, 0);
    assert!(!tracker.is_blocked("user@example.com", 1).await);

    assert!(store.ping().await.is_err());
}

#[test]
fn test_wiring_errors_are_configuration_errors() {
    let err = BucketRule::new(0, 1.0, 60).unwrap_err();
    assert!(!err.is_store_failure());
    assert_eq!(err.kind(), "configuration");

    let err = FloodgateConfigBuilder::new()
        .with_lockout(5, Duration::ZERO)
        .build()
        .unwrap_err();
    assert!(matches!(err, FloodgateError::Configuration(_)));
}
