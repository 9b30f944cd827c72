//! Floodgate - Abuse prevention for Axum services
//!
//! Floodgate keeps a shared store between your handlers and the people
//! hammering them. State lives in Redis, so limits hold across every process
//! serving the application, and every store failure fails open.
//!
//! # Features
//!
//! - **Rate limiting**: atomic token buckets evaluated in one store round trip
//! - **Key strategies**: limit by client address, signed-in user or submitted account
//! - **Denial responses**: plain `429`, inline messages for fragment clients, or your own
//! - **Login lockout**: per-account failure counters with a rolling window
//! - **Stores**: Redis (default feature) or in-process for single instances and tests
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::post};
//! use floodgate::{Floodgate, FloodgateConfigBuilder};
//! use floodgate::ratelimit::BucketRule;
//!
//! async fn login() -> &'static str {
//!     "ok"
//! }
//!
//! #[tokio::main]
//! async fn main() -> floodgate::Result<()> {
//!     floodgate::init_tracing();
//!
//!     let config = FloodgateConfigBuilder::new().from_env().build()?;
//!     let floodgate = Floodgate::connect(&config).await?;
//!
//!     let app: Router = Router::new()
//!         .route("/api/login", post(login))
//!         .route_layer(floodgate.limit(BucketRule::login()).scope("login").build());
//!     # let _ = app;
//!     Ok(())
//! }
//! ```

mod app;
pub mod auth;
mod config;
mod error;
pub mod keys;
pub mod ratelimit;
pub mod store;
pub mod traits;
mod utils;

// Re-exports for public API
pub use app::Floodgate;
pub use auth::{FailedLoginTracker, LockoutPolicy, LoginGate};
pub use config::{FloodgateConfig, FloodgateConfigBuilder, LockoutConfig, LoggingConfig};
pub use error::{FloodgateError, Result};
pub use keys::{AuthenticatedIdentity, ClientAddress, Identity, KeyStrategy, SubmittedAccount};
pub use ratelimit::{
    BucketRule, Decision, DenialResponder, RateLimitLayer, TokenBucketLimiter, rate_limit,
};
pub use store::{InMemoryStore, StoreBackend, StoreConfig, StoreHandle};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use traits::store::CounterStore;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before building the router.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "floodgate=debug")
/// - `FLOODGATE_LOG_JSON`: Set to "true" for JSON formatted logs
///
/// # Example
///
/// ```rust,no_run
/// #[tokio::main]
/// async fn main() {
///     floodgate::init_tracing();
///     // ... rest of your app
/// }
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &FloodgateConfig) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
