//! Shared counter store backends.
//!
//! Redis is the production backend (enabled by the default `redis` feature).
//! The in-memory store serves single-instance deployments and tests. Callers
//! hold a [`StoreHandle`], which bounds every call with a timeout and can be
//! explicitly disabled.

mod config;
mod handle;
mod in_memory;

#[cfg(feature = "redis")]
mod redis;

pub use config::{StoreBackend, StoreConfig};
pub use handle::StoreHandle;
pub use in_memory::InMemoryStore;

#[cfg(feature = "redis")]
pub use redis::RedisStore;
