//! Utility functions and helpers.
//!
//! Common utilities for environment variable handling and clock access.

pub mod env;

pub use env::{get_env_with_prefix, parse_env_with_prefix};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the Unix epoch
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}
