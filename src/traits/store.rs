//! Counter store trait for shared rate-limit state
//!
//! This trait abstracts the key-value store that holds token buckets and
//! failed-login counters. Every method is a single atomic round trip: the
//! subsystem never reads a record and writes it back from the application
//! side, so correctness holds across many server processes.

use crate::error::Result;
use crate::ratelimit::BucketRequest;
use async_trait::async_trait;
use std::time::Duration;

/// Shared store operations required by the limiter and the lockout tracker
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Evaluate the token bucket stored at `key` as one atomic operation.
    ///
    /// Creates the bucket at full capacity if it does not exist, refills it
    /// for the elapsed time, consumes `request.requested` tokens when enough
    /// are available and refreshes the TTL. Returns whether the request was
    /// allowed.
    async fn take_tokens(&self, key: &str, request: &BucketRequest) -> Result<bool>;

    /// Atomically increment the counter at `key` and return the new value.
    ///
    /// When the increment creates the counter, its expiry is set to `window`
    /// in the same operation. Later increments leave the expiry untouched.
    async fn increment(&self, key: &str, window: Duration) -> Result<i64>;

    /// Read the counter at `key`, `None` if absent or expired
    async fn counter(&self, key: &str) -> Result<Option<i64>>;

    /// Delete whatever is stored at `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
