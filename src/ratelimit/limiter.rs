use super::config::BucketRule;
use crate::error::{FloodgateError, Result};
use crate::ratelimit::BucketRequest;
use crate::store::StoreHandle;
use crate::utils::unix_now;
use std::time::Duration;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Enough tokens were available and one was consumed
    Allowed,
    /// The bucket is empty
    Denied,
    /// The store failed; the request is allowed without being counted
    Degraded { reason: FloodgateError },
}

impl Decision {
    /// Whether the request may proceed (degraded checks fail open)
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Atomic token-bucket limiter over the shared store
///
/// Each evaluation is a single store round trip that refills the bucket for
/// the elapsed time and consumes tokens in one atomic step, so concurrent
/// callers on the same key can never oversubscribe it.
#[derive(Debug, Clone)]
pub struct TokenBucketLimiter {
    store: StoreHandle,
}

impl TokenBucketLimiter {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Evaluate the bucket at `key` at time `now` (Unix seconds).
    ///
    /// Returns whether `requested` tokens could be taken. Store failures are
    /// returned as errors and never reported as a denial.
    pub async fn allow(
        &self,
        key: &str,
        now: i64,
        capacity: f64,
        refill_rate: f64,
        requested: f64,
        ttl_seconds: u64,
    ) -> Result<bool> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(FloodgateError::configuration(format!(
                "bucket capacity must be positive, got {}",
                capacity
            )));
        }
        if !refill_rate.is_finite() || refill_rate < 0.0 {
            return Err(FloodgateError::configuration(format!(
                "refill rate must not be negative, got {}",
                refill_rate
            )));
        }
        if !requested.is_finite() || requested <= 0.0 {
            return Err(FloodgateError::configuration(format!(
                "requested tokens must be positive, got {}",
                requested
            )));
        }

        let request = BucketRequest {
            now,
            capacity,
            refill_rate,
            requested,
            ttl: Duration::from_secs(ttl_seconds.max(1)),
        };
        self.store.take_tokens(key, &request).await
    }

    /// Take one token from `key` under `rule`, at the current time
    pub async fn check(&self, key: &str, rule: &BucketRule) -> Decision {
        self.check_at(key, rule, unix_now(), 1).await
    }

    /// Take `requested` tokens from `key` under `rule`, at time `now`.
    ///
    /// Store failures fail open as [`Decision::Degraded`].
    pub async fn check_at(&self, key: &str, rule: &BucketRule, now: i64, requested: u32) -> Decision {
        let request = rule.request(now, requested.max(1));

        match self.store.take_tokens(key, &request).await {
            Ok(true) => Decision::Allowed,
            Ok(false) => Decision::Denied,
            Err(reason) => {
                tracing::warn!(
                    target: "floodgate.ratelimit.degraded",
                    key = %key,
                    backend = self.store.backend(),
                    error = %reason,
                    "Rate limit store unavailable, allowing request"
                );
                Decision::Degraded { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> TokenBucketLimiter {
        TokenBucketLimiter::new(StoreHandle::in_memory())
    }

    #[tokio::test]
    async fn test_allow_rejects_invalid_arguments() {
        let limiter = limiter();

        for (capacity, rate, requested) in [
            (0.0, 1.0, 1.0),
            (f64::NAN, 1.0, 1.0),
            (5.0, -1.0, 1.0),
            (5.0, f64::INFINITY, 1.0),
            (5.0, 1.0, 0.0),
        ] {
            let err = limiter
                .allow("bucket", 0, capacity, rate, requested, 60)
                .await
                .unwrap_err();
            assert!(matches!(err, FloodgateError::Configuration(_)));
        }
    }

    #[tokio::test]
    async fn test_requested_above_capacity_is_always_denied() {
        let limiter = limiter();
        assert!(!limiter.allow("bucket", 0, 3.0, 1.0, 4.0, 60).await.unwrap());
        // Nothing was consumed by the denial
        assert!(limiter.allow("bucket", 0, 3.0, 1.0, 3.0, 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_at_decisions() {
        let limiter = limiter();
        let rule = BucketRule::new(2, 1.0, 60).unwrap();

        assert_eq!(limiter.check_at("bucket", &rule, 100, 1).await, Decision::Allowed);
        assert_eq!(limiter.check_at("bucket", &rule, 100, 1).await, Decision::Allowed);
        assert_eq!(limiter.check_at("bucket", &rule, 100, 1).await, Decision::Denied);
        assert_eq!(limiter.check_at("bucket", &rule, 101, 1).await, Decision::Allowed);
    }

    #[tokio::test]
    async fn test_disabled_store_always_allows() {
        let limiter = TokenBucketLimiter::new(StoreHandle::disabled());
        let rule = BucketRule::new(1, 1.0, 60).unwrap();

        for _ in 0..5 {
            assert_eq!(limiter.check("bucket", &rule).await, Decision::Allowed);
        }
    }

    #[test]
    fn test_decision_predicates() {
        let degraded = Decision::Degraded {
            reason: FloodgateError::store_unavailable("refused"),
        };
        assert!(degraded.is_allowed());
        assert!(degraded.is_degraded());
        assert!(Decision::Allowed.is_allowed());
        assert!(!Decision::Denied.is_allowed());
    }
}
