use std::time::Duration;

/// The main error type for Floodgate
///
/// Only wiring code and the low-level `allow`/`try_*` calls ever see this
/// type. The middleware and the login tracker convert every store failure
/// into a fail-open outcome before it reaches request handlers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FloodgateError {
    /// The store could not be reached (connection refused, broken pipe, ...)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store did not answer within the configured bound
    #[error("Store call timed out after {0:?}")]
    StoreTimeout(Duration),

    /// The store answered with something the subsystem cannot interpret
    #[error("Store protocol error: {0}")]
    StoreProtocol(String),

    /// Invalid limits or store settings supplied at wiring time
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FloodgateError {
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn store_protocol(msg: impl Into<String>) -> Self {
        Self::StoreProtocol(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error came from the shared store.
    ///
    /// Store failures are always handled by failing open; configuration
    /// errors are programming errors and should stop the process at startup.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::StoreTimeout(_) | Self::StoreProtocol(_)
        )
    }

    /// Short machine-friendly label used in log fields and response headers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::StoreTimeout(_) => "store_timeout",
            Self::StoreProtocol(_) => "store_protocol",
            Self::Configuration(_) => "configuration",
        }
    }
}

/// Result type alias for Floodgate operations
pub type Result<T> = std::result::Result<T, FloodgateError>;

#[cfg(feature = "redis")]
impl From<redis::RedisError> for FloodgateError {
    fn from(err: redis::RedisError) -> Self {
        // Classify based on error category
        match err.kind() {
            redis::ErrorKind::TypeError | redis::ErrorKind::ResponseError => {
                FloodgateError::StoreProtocol(format!("Redis reply error: {}", err))
            }
            redis::ErrorKind::InvalidClientConfig => {
                FloodgateError::Configuration(format!("Invalid Redis configuration: {}", err))
            }
            _ => FloodgateError::StoreUnavailable(format!("Redis error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failures_are_classified() {
        assert!(FloodgateError::store_unavailable("refused").is_store_failure());
        assert!(FloodgateError::StoreTimeout(Duration::from_secs(3)).is_store_failure());
        assert!(FloodgateError::store_protocol("bad reply").is_store_failure());
        assert!(!FloodgateError::configuration("capacity must be positive").is_store_failure());
    }

    #[test]
    fn test_error_display() {
        let err = FloodgateError::store_unavailable("connection refused");
        assert_eq!(err.to_string(), "Store unavailable: connection refused");

        let err = FloodgateError::StoreTimeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Store call timed out after 1.5s");
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(FloodgateError::store_protocol("x").kind(), "store_protocol");
        assert_eq!(FloodgateError::configuration("x").kind(), "configuration");
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_type_error_is_protocol() {
        let err: FloodgateError =
            redis::RedisError::from((redis::ErrorKind::TypeError, "unexpected reply")).into();
        assert!(matches!(err, FloodgateError::StoreProtocol(_)));

        let err: FloodgateError =
            redis::RedisError::from(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
                .into();
        assert!(matches!(err, FloodgateError::StoreUnavailable(_)));
    }
}
