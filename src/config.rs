use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::lockout::LockoutPolicy;
use crate::error::{FloodgateError, Result};
use crate::store::{StoreBackend, StoreConfig};
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Main configuration for Floodgate
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FloodgateConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LockoutConfig {
    /// Failures tolerated inside the window before an account is blocked
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Window length, counted from the first failure (in seconds)
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_threshold() -> u32 {
    5
}

fn default_window_seconds() -> u64 {
    900 // 15 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl LockoutConfig {
    pub fn policy(&self) -> Result<LockoutPolicy> {
        LockoutPolicy::new(self.threshold, Duration::from_secs(self.window_seconds))
    }
}

/// Builder for FloodgateConfig with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct FloodgateConfigBuilder {
    config: FloodgateConfig,
}

impl FloodgateConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FloodgateConfig::default(),
        }
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.config.store.backend = backend;
        self
    }

    /// Use the Redis server at `url`
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.store.backend = StoreBackend::Redis;
        self.config.store.redis_url = Some(url.into());
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_key_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.store.key_namespace = namespace.into();
        self
    }

    pub fn with_lockout(mut self, threshold: u32, window: Duration) -> Self {
        self.config.lockout = LockoutConfig {
            threshold,
            window_seconds: window.as_secs(),
        };
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    /// Load configuration from environment variables with FLOODGATE_ prefix
    pub fn from_env(mut self) -> Self {
        self.config.store = StoreConfig::from_env();

        if let Some(threshold) = parse_env_with_prefix("LOCKOUT_THRESHOLD") {
            self.config.lockout.threshold = threshold;
        }
        if let Some(window) = parse_env_with_prefix("LOCKOUT_WINDOW_SECONDS") {
            self.config.lockout.window_seconds = window;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error for:
    /// - A zero store timeout
    /// - An empty key namespace
    /// - A Redis backend without a URL or address
    /// - A zero lockout threshold or window
    /// - An invalid log level
    pub fn build(self) -> Result<FloodgateConfig> {
        let config = self.config;

        if config.store.timeout_ms == 0 {
            return Err(FloodgateError::configuration(
                "Store timeout must be greater than 0",
            ));
        }

        if config.store.key_namespace.trim().is_empty() {
            return Err(FloodgateError::configuration(
                "Key namespace must not be empty",
            ));
        }

        if config.store.backend == StoreBackend::Redis
            && config.store.redis_url.is_none()
            && config.store.redis_addr.is_none()
        {
            return Err(FloodgateError::configuration(
                "Redis backend requires REDIS_URL or REDIS_ADDR",
            ));
        }

        config.lockout.policy()?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(FloodgateError::configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(config)
    }
}

impl Default for FloodgateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
