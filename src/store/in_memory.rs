//! In-process counter store backed by dashmap
//!
//! Intended for single-instance deployments and tests. Each key is guarded by
//! its dashmap shard lock for the duration of one operation, which gives the
//! same per-key atomicity the Redis scripts provide. Records carry an expiry
//! and are swept periodically so memory stays bounded by the active key set.

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{BucketRequest, BucketState};
use crate::traits::store::CounterStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Sweep expired records every N operations to prevent unbounded memory growth.
const SWEEP_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy)]
enum Value {
    Bucket(BucketState),
    Counter(i64),
}

#[derive(Debug, Clone, Copy)]
struct Record {
    value: Value,
    expires_at: Instant,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// The live bucket in this record, if any.
    ///
    /// A live record of another type is a key collision, reported the way
    /// Redis reports `WRONGTYPE`.
    fn live_bucket(&self, now: Instant) -> Result<Option<BucketState>> {
        if !self.is_live(now) {
            return Ok(None);
        }
        match self.value {
            Value::Bucket(state) => Ok(Some(state)),
            Value::Counter(_) => Err(wrong_type("bucket")),
        }
    }

    fn live_counter(&self, now: Instant) -> Result<Option<i64>> {
        if !self.is_live(now) {
            return Ok(None);
        }
        match self.value {
            Value::Counter(count) => Ok(Some(count)),
            Value::Bucket(_) => Err(wrong_type("counter")),
        }
    }
}

fn wrong_type(expected: &str) -> FloodgateError {
    FloodgateError::store_protocol(format!(
        "key holds a different record type, expected {}",
        expected
    ))
}

/// In-memory counter store
///
/// # Example
///
/// ```rust,ignore
/// use floodgate::store::{InMemoryStore, StoreHandle};
///
/// let store = StoreHandle::new(InMemoryStore::new());
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<String, Record>,
    operations: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired record now
    pub fn sweep(&self) {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now));
        tracing::debug!(
            target: "floodgate.store.sweep",
            removed = before.saturating_sub(self.records.len()),
            remaining = self.records.len(),
            "Swept expired records"
        );
    }

    /// Number of stored records, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn maybe_sweep(&self) {
        // Must run before taking an entry lock: retain locks every shard.
        let count = self.operations.fetch_add(1, Ordering::Relaxed);
        if count % SWEEP_INTERVAL == 0 && count > 0 {
            self.sweep();
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn take_tokens(&self, key: &str, request: &BucketRequest) -> Result<bool> {
        self.maybe_sweep();
        let now = Instant::now();
        let expires_at = now + request.ttl;

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.get().live_bucket(now)?;
                let (state, allowed) = BucketState::refill_and_take(previous, request);
                occupied.insert(Record {
                    value: Value::Bucket(state),
                    expires_at,
                });
                Ok(allowed)
            }
            Entry::Vacant(vacant) => {
                let (state, allowed) = BucketState::refill_and_take(None, request);
                vacant.insert(Record {
                    value: Value::Bucket(state),
                    expires_at,
                });
                Ok(allowed)
            }
        }
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        self.maybe_sweep();
        let now = Instant::now();
        let fresh = Record {
            value: Value::Counter(1),
            expires_at: now + window,
        };

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get().live_counter(now)? {
                Some(count) => {
                    let record = occupied.get_mut();
                    record.value = Value::Counter(count + 1);
                    Ok(count + 1)
                }
                None => {
                    occupied.insert(fresh);
                    Ok(1)
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(1)
            }
        }
    }

    async fn counter(&self, key: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        match self.records.get(key) {
            Some(record) => record.live_counter(now),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
