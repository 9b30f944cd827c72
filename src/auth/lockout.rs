//! Failed-login lockout tracking.
//!
//! Counts failed logins per account in the shared store. The count lives in a
//! window that starts at the first failure and is cleared on success; an
//! account is blocked while its count is at or above the threshold. Blocking
//! is derived on every check, so threshold changes apply immediately.
//!
//! Every store failure fails open: an increment counts nothing, a check
//! reports the account as not blocked, and a clear is skipped. Nothing here
//! ever stops a legitimate login because the store is down.
//!
//! # Example
//!
//! ```rust,ignore
//! use floodgate::auth::lockout::{FailedLoginTracker, LockoutPolicy};
//!
//! let tracker = FailedLoginTracker::new(store, LockoutPolicy::default());
//!
//! if tracker.check(&form.email).await.is_locked() {
//!     return too_many_attempts();
//! }
//! if !verify(&form).await {
//!     tracker.record_failure(&form.email).await;
//!     return invalid_credentials();
//! }
//! tracker.record_success(&form.email).await;
//! ```

use crate::error::{FloodgateError, Result};
use crate::keys::normalize_account;
use crate::store::StoreHandle;
use std::time::Duration;

/// Default failures tolerated inside the window before blocking.
const DEFAULT_THRESHOLD: u32 = 5;

/// Default lockout window (15 minutes).
const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

const DEFAULT_KEY_PREFIX: &str = "rl:fail:email";

/// Lockout policy configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    threshold: u32,
    window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: DEFAULT_WINDOW,
        }
    }
}

impl LockoutPolicy {
    /// Create a policy, rejecting a zero threshold or window.
    pub fn new(threshold: u32, window: Duration) -> Result<Self> {
        if threshold == 0 {
            return Err(FloodgateError::configuration(
                "lockout threshold must be positive",
            ));
        }
        if window.as_secs() == 0 {
            return Err(FloodgateError::configuration(
                "lockout window must be at least one second",
            ));
        }
        Ok(Self { threshold, window })
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Lockout state of an account as seen by one check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoginGate {
    /// Failed attempts inside the current window.
    pub attempts: i64,
    /// Whether further attempts are refused.
    pub locked: bool,
}

impl LoginGate {
    fn open() -> Self {
        Self {
            attempts: 0,
            locked: false,
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Failed-login counter over the shared store.
#[derive(Clone, Debug)]
pub struct FailedLoginTracker {
    store: StoreHandle,
    policy: LockoutPolicy,
    key_prefix: String,
}

impl FailedLoginTracker {
    #[must_use]
    pub fn new(store: StoreHandle, policy: LockoutPolicy) -> Self {
        Self {
            store,
            policy,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Prefix for every counter key (default `rl:fail:email`)
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    fn key(&self, account: &str) -> Option<String> {
        normalize_account(account).map(|account| format!("{}:{}", self.key_prefix, account))
    }

    /// Count one failure and return the count inside the window.
    ///
    /// The first failure starts a window of `window_seconds`; later failures
    /// do not extend it. Returns `0` for an empty account or when the store
    /// fails.
    pub async fn increment(&self, account: &str, window_seconds: u64) -> i64 {
        let Some(key) = self.key(account) else {
            return 0;
        };

        let window = Duration::from_secs(window_seconds.max(1));
        match self.store.increment(&key, window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    target: "auth.lockout.store_error",
                    key = %key,
                    error = %e,
                    "Failed to record login failure"
                );
                0
            }
        }
    }

    /// Failed attempts inside the current window, `0` when unknown.
    pub async fn attempts(&self, account: &str) -> i64 {
        let Some(key) = self.key(account) else {
            return 0;
        };

        match self.store.counter(&key).await {
            Ok(count) => count.unwrap_or(0).max(0),
            Err(e) => {
                tracing::warn!(
                    target: "auth.lockout.store_error",
                    key = %key,
                    error = %e,
                    "Failed to read login failures"
                );
                0
            }
        }
    }

    /// Whether `account` has at least `threshold` failures in its window.
    ///
    /// A `threshold` of `0` is treated as `1`: an account with no recorded
    /// failures is never blocked. [`LockoutPolicy::new`] rejects `0` outright.
    pub async fn is_blocked(&self, account: &str, threshold: u32) -> bool {
        self.attempts(account).await >= i64::from(threshold.max(1))
    }

    /// Forget all failures for `account`.
    pub async fn clear(&self, account: &str) {
        let Some(key) = self.key(account) else {
            return;
        };

        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(
                target: "auth.lockout.store_error",
                key = %key,
                error = %e,
                "Failed to clear login failures"
            );
        }
    }

    /// Check the account against the policy before verifying credentials.
    pub async fn check(&self, account: &str) -> LoginGate {
        let attempts = self.attempts(account).await;
        let locked = attempts >= i64::from(self.policy.threshold);

        if locked {
            tracing::debug!(
                target: "auth.lockout.blocked",
                attempts = attempts,
                threshold = self.policy.threshold,
                "Login attempt blocked by lockout"
            );
        }

        LoginGate { attempts, locked }
    }

    /// Record a failed verification under the policy window.
    pub async fn record_failure(&self, account: &str) -> LoginGate {
        let attempts = self.increment(account, self.policy.window.as_secs()).await;
        if attempts == 0 {
            return LoginGate::open();
        }

        let locked = attempts >= i64::from(self.policy.threshold);
        tracing::info!(
            target: "auth.lockout.failure_recorded",
            attempts = attempts,
            threshold = self.policy.threshold,
            "Failed login recorded"
        );
        if attempts == i64::from(self.policy.threshold) {
            tracing::warn!(
                target: "auth.lockout.account_locked",
                attempts = attempts,
                window_secs = self.policy.window.as_secs(),
                "Account locked due to failed attempts"
            );
        }

        LoginGate { attempts, locked }
    }

    /// Clear the account's failures after a successful login.
    pub async fn record_success(&self, account: &str) {
        self.clear(account).await;
        tracing::debug!(target: "auth.lockout.cleared", "Login failures cleared");
    }
}
