use crate::error::{FloodgateError, Result};
use super::bucket::BucketRequest;
use std::time::Duration;

/// Limits applied by one rate-limited route
///
/// A rule is validated when it is built, so a rule value always has a
/// positive capacity, a positive finite refill rate and a non-zero TTL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketRule {
    capacity: u32,
    refill_per_second: f64,
    ttl_seconds: u64,
}

impl BucketRule {
    /// Create a rule, rejecting non-positive limits.
    ///
    /// The TTL should exceed `capacity / refill_per_second` so that a drained
    /// bucket is not forgotten before it would have refilled on its own. A
    /// shorter TTL is accepted (expiry then acts as a reset) but logged.
    pub fn new(capacity: u32, refill_per_second: f64, ttl_seconds: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(FloodgateError::configuration(
                "bucket capacity must be positive",
            ));
        }
        if !refill_per_second.is_finite() || refill_per_second <= 0.0 {
            return Err(FloodgateError::configuration(format!(
                "refill rate must be a positive number of tokens per second, got {}",
                refill_per_second
            )));
        }
        if ttl_seconds == 0 {
            return Err(FloodgateError::configuration("bucket TTL must be positive"));
        }

        let rule = Self {
            capacity,
            refill_per_second,
            ttl_seconds,
        };

        if rule.refill_horizon() > rule.ttl() {
            tracing::warn!(
                capacity = capacity,
                refill_per_second = refill_per_second,
                ttl_seconds = ttl_seconds,
                "Bucket TTL is shorter than its refill time; idle buckets will reset early"
            );
        }

        Ok(rule)
    }

    /// Limits for account signup: a burst of 5, then one attempt every 20 seconds
    pub fn signup() -> Self {
        Self {
            capacity: 5,
            refill_per_second: 0.05,
            ttl_seconds: 900,
        }
    }

    /// Limits for the login endpoint: a burst of 10, refilling one per second
    pub fn login() -> Self {
        Self {
            capacity: 10,
            refill_per_second: 1.0,
            ttl_seconds: 60,
        }
    }

    /// Limits for task create/edit/delete endpoints
    pub fn task_mutation() -> Self {
        Self {
            capacity: 60,
            refill_per_second: 1.0,
            ttl_seconds: 60,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_per_second(&self) -> f64 {
        self.refill_per_second
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Time a fully drained bucket needs to refill completely
    pub fn refill_horizon(&self) -> Duration {
        Duration::from_secs_f64(self.capacity as f64 / self.refill_per_second)
    }

    /// Build the store request for one evaluation at `now`
    pub(crate) fn request(&self, now: i64, requested: u32) -> BucketRequest {
        BucketRequest {
            now,
            capacity: self.capacity as f64,
            refill_rate: self.refill_per_second,
            requested: requested as f64,
            ttl: self.ttl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rule() {
        let rule = BucketRule::new(5, 0.5, 600).unwrap();
        assert_eq!(rule.capacity(), 5);
        assert_eq!(rule.ttl(), Duration::from_secs(600));
        assert_eq!(rule.refill_horizon(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = BucketRule::new(0, 1.0, 60).unwrap_err();
        assert!(matches!(err, FloodgateError::Configuration(_)));
    }

    #[test]
    fn test_rejects_bad_refill_rates() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = BucketRule::new(5, rate, 60);
            assert!(result.is_err(), "rate {} should be rejected", rate);
        }
    }

    #[test]
    fn test_rejects_zero_ttl() {
        assert!(BucketRule::new(5, 1.0, 0).is_err());
    }

    #[test]
    fn test_short_ttl_is_accepted() {
        // 10 tokens at 0.01/s take 1000s to refill; a 60s TTL resets earlier
        let rule = BucketRule::new(10, 0.01, 60).unwrap();
        assert!(rule.refill_horizon() > rule.ttl());
    }

    #[test]
    fn test_presets_refill_within_ttl() {
        for rule in [BucketRule::signup(), BucketRule::login(), BucketRule::task_mutation()] {
            assert!(rule.refill_horizon() <= rule.ttl(), "{:?}", rule);
            assert_eq!(BucketRule::new(rule.capacity(), rule.refill_per_second(), rule.ttl_seconds()), Ok(rule));
        }
    }

    #[test]
    fn test_request_conversion() {
        let request = BucketRule::login().request(1_700_000_000, 1);
        assert_eq!(request.now, 1_700_000_000);
        assert_eq!(request.capacity, 10.0);
        assert_eq!(request.refill_rate, 1.0);
        assert_eq!(request.requested, 1.0);
        assert_eq!(request.ttl_seconds(), 60);
    }
}
