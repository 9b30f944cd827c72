use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis server (requires the `redis` feature)
    Redis,
    /// Process-local store, for single-instance deployments and tests
    Memory,
    /// No store: every check is allowed and no failures are counted
    #[default]
    Disabled,
}

/// Shared store configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL, preferred over `redis_addr`
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Redis `host:port`, used when no URL is set
    #[serde(default)]
    pub redis_addr: Option<String>,

    /// Password for `redis_addr`
    #[serde(default, skip_serializing)]
    pub redis_password: Option<String>,

    /// Upper bound for every store call (in milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Prefix of every rate-limit bucket key
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: None,
            redis_addr: None,
            redis_password: None,
            timeout_ms: default_timeout_ms(),
            key_namespace: default_key_namespace(),
        }
    }
}

impl StoreConfig {
    /// Load store configuration from environment variables
    ///
    /// Reads `REDIS_URL`, or `REDIS_ADDR` with `REDIS_PASSWORD`, each of which
    /// may also carry the `FLOODGATE_` prefix. Without an explicit
    /// `FLOODGATE_STORE_BACKEND`, a configured Redis server selects the Redis
    /// backend and anything else leaves the store disabled.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.redis_url = get_env_with_prefix("REDIS_URL");
        config.redis_addr = get_env_with_prefix("REDIS_ADDR");
        config.redis_password = get_env_with_prefix("REDIS_PASSWORD");

        if config.redis_url.is_some() || config.redis_addr.is_some() {
            config.backend = StoreBackend::Redis;
        }

        if let Some(backend) = get_env_with_prefix("STORE_BACKEND") {
            config.backend = match backend.trim().to_lowercase().as_str() {
                "redis" => StoreBackend::Redis,
                "memory" | "in_memory" | "inmemory" => StoreBackend::Memory,
                "disabled" | "none" | "off" => StoreBackend::Disabled,
                other => {
                    tracing::warn!(
                        backend = %other,
                        "Unknown store backend, keeping {:?}",
                        config.backend
                    );
                    config.backend
                }
            };
        }

        if let Some(timeout_ms) = parse_env_with_prefix::<u64>("STORE_TIMEOUT_MS") {
            config.timeout_ms = timeout_ms;
        }

        if let Some(namespace) = get_env_with_prefix("KEY_NAMESPACE") {
            config.key_namespace = namespace.trim().to_string();
        }

        config
    }

    /// Upper bound for every store call
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    3000 // 3 seconds
}

fn default_key_namespace() -> String {
    "rl:tb".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreBackend::Disabled);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.key_namespace, "rl:tb");
    }

    #[test]
    fn test_deserialize_backend() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"backend":"memory","timeout_ms":250}"#).unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.key_namespace, "rl:tb");
    }

    #[test]
    fn test_password_is_not_serialized() {
        let config = StoreConfig {
            redis_password: Some("hunter2".to_string()),
            ..StoreConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
