use super::config::{StoreBackend, StoreConfig};
use super::in_memory::InMemoryStore;
use crate::error::{FloodgateError, Result};
use crate::ratelimit::BucketRequest;
use crate::traits::store::CounterStore;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
enum Backend {
    Connected(Arc<dyn CounterStore>),
    Disabled,
}

/// Injected handle to the shared counter store
///
/// Cloning is cheap. Every call through the handle is bounded by its timeout;
/// an expired call fails with [`FloodgateError::StoreTimeout`] and is never
/// retried.
///
/// A disabled handle is a normal state, not an error: bucket checks are
/// allowed, increments count `0`, reads find nothing and deletes succeed.
///
/// # Example
///
/// ```rust,ignore
/// use floodgate::store::{InMemoryStore, StoreHandle};
/// use std::time::Duration;
///
/// let store = StoreHandle::new(InMemoryStore::new())
///     .with_timeout(Duration::from_millis(500));
/// ```
#[derive(Clone)]
pub struct StoreHandle {
    backend: Backend,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(store: impl CounterStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn CounterStore>) -> Self {
        Self {
            backend: Backend::Connected(store),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A handle with no store behind it
    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Shorthand for a handle over a fresh [`InMemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the handle described by `config`.
    ///
    /// No connection is made here. Only invalid settings fail, so a Redis
    /// server that is down at startup does not stop the process.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        if config.timeout_ms == 0 {
            return Err(FloodgateError::configuration(
                "store timeout must be positive",
            ));
        }

        let handle = match config.backend {
            StoreBackend::Disabled => {
                tracing::warn!(
                    target: "floodgate.store.disabled",
                    "No shared store configured; rate limiting and lockout are disabled"
                );
                Self::disabled()
            }
            StoreBackend::Memory => Self::in_memory(),
            StoreBackend::Redis => Self::redis_from_config(config)?,
        };

        Ok(handle.with_timeout(config.timeout()))
    }

    #[cfg(feature = "redis")]
    fn redis_from_config(config: &StoreConfig) -> Result<Self> {
        use super::redis::RedisStore;

        let store = match (&config.redis_url, &config.redis_addr) {
            (Some(url), _) => RedisStore::new(url)?,
            (None, Some(addr)) => RedisStore::from_addr(addr, config.redis_password.as_deref())?,
            (None, None) => {
                return Err(FloodgateError::configuration(
                    "Redis backend selected but neither REDIS_URL nor REDIS_ADDR is set",
                ));
            }
        };
        Ok(Self::new(store))
    }

    #[cfg(not(feature = "redis"))]
    fn redis_from_config(_config: &StoreConfig) -> Result<Self> {
        Err(FloodgateError::configuration(
            "Redis backend selected but the redis feature is not enabled",
        ))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.backend, Backend::Connected(_))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backend name for logs
    pub fn backend(&self) -> &'static str {
        match &self.backend {
            Backend::Connected(store) => store.backend(),
            Backend::Disabled => "disabled",
        }
    }

    /// Check connectivity, logging a warning when the store is unreachable.
    ///
    /// Meant for startup: the result is informational and the handle stays
    /// usable either way.
    pub async fn ping(&self) -> Result<()> {
        let Backend::Connected(store) = &self.backend else {
            return Ok(());
        };

        let result = self.bounded(store.ping()).await;
        match &result {
            Ok(()) => tracing::info!(
                target: "floodgate.store.ready",
                backend = store.backend(),
                "Shared store reachable"
            ),
            Err(e) => tracing::warn!(
                target: "floodgate.store.unreachable",
                backend = store.backend(),
                error = %e,
                "Shared store unreachable; continuing and failing open"
            ),
        }
        result
    }

    pub async fn take_tokens(&self, key: &str, request: &BucketRequest) -> Result<bool> {
        match &self.backend {
            Backend::Connected(store) => self.bounded(store.take_tokens(key, request)).await,
            Backend::Disabled => Ok(true),
        }
    }

    pub async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        match &self.backend {
            Backend::Connected(store) => self.bounded(store.increment(key, window)).await,
            Backend::Disabled => Ok(0),
        }
    }

    pub async fn counter(&self, key: &str) -> Result<Option<i64>> {
        match &self.backend {
            Backend::Connected(store) => self.bounded(store.counter(key)).await,
            Backend::Disabled => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Connected(store) => self.bounded(store.delete(key)).await,
            Backend::Disabled => Ok(()),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(FloodgateError::StoreTimeout(self.timeout)))
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("backend", &self.backend())
            .field("timeout", &self.timeout)
            .finish()
    }
}
