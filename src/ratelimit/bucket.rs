//! Token bucket state and refill math.
//!
//! The bucket is refilled lazily from elapsed wall-clock time whenever it is
//! evaluated, so idle keys cost nothing between requests. The Redis store runs
//! the same algorithm inside a Lua script; [`BucketState::refill_and_take`] is
//! the in-process rendition used by [`InMemoryStore`](crate::store::InMemoryStore).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Persisted state of a single bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    /// Currently available tokens, always within `[0, capacity]`
    pub tokens: f64,
    /// Unix timestamp (seconds) of the last evaluation
    pub last_refill: i64,
}

/// One evaluation of a bucket, as sent to the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketRequest {
    /// Evaluation time in Unix seconds
    pub now: i64,
    /// Maximum burst size
    pub capacity: f64,
    /// Tokens added per second
    pub refill_rate: f64,
    /// Tokens this request wants to consume
    pub requested: f64,
    /// Idle time after which the store forgets the bucket
    pub ttl: Duration,
}

impl BucketRequest {
    /// TTL in whole seconds, never below one second
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

impl BucketState {
    /// A bucket seen for the first time starts full.
    pub fn full(capacity: f64, now: i64) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Add the tokens earned since `last_refill`, capped at `capacity`.
    ///
    /// A clock that moved backwards earns nothing.
    #[must_use]
    pub fn refilled(self, now: i64, capacity: f64, refill_rate: f64) -> Self {
        let elapsed = now.saturating_sub(self.last_refill).max(0) as f64;
        let tokens = (self.tokens + elapsed * refill_rate).clamp(0.0, capacity);
        Self {
            tokens,
            last_refill: now,
        }
    }

    /// Refill, then consume `requested` tokens if enough are available.
    ///
    /// Returns the state to persist and whether the request was allowed.
    /// Denied requests still persist the refill so the timestamp advances,
    /// but consume nothing.
    pub fn refill_and_take(previous: Option<Self>, request: &BucketRequest) -> (Self, bool) {
        let mut state = previous
            .unwrap_or_else(|| Self::full(request.capacity, request.now))
            .refilled(request.now, request.capacity, request.refill_rate);

        if state.tokens < request.requested {
            return (state, false);
        }

        state.tokens -= request.requested;
        (state, true)
    }
}
