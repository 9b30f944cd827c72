//! Rate-limit key strategies.
//!
//! A strategy decides *who* a request is counted against: the client address
//! for public endpoints, the signed-in user for authenticated ones, or the
//! account named in a login form. Returning `None` exempts the request from
//! limiting altogether.

mod account;
mod address;
mod identity;

pub use account::{SubmittedAccount, normalize_account};
pub use address::ClientAddress;
pub use identity::{AuthenticatedIdentity, Identity};

use async_trait::async_trait;
use axum::extract::Request;

/// Derives the partition key for a request
///
/// The request is passed mutably so strategies that inspect the body can
/// buffer it and put it back for the handler.
#[async_trait]
pub trait KeyStrategy: Send + Sync + 'static {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    /// The key to count this request against, or `None` to skip limiting
    async fn key(&self, request: &mut Request) -> Option<String>;
}

/// Strategy built from a plain function over the request headers and extensions
///
/// ```rust,ignore
/// use floodgate::keys::key_fn;
///
/// let by_tenant = key_fn("tenant", |req| {
///     req.headers()
///         .get("x-tenant-id")
///         .and_then(|v| v.to_str().ok())
///         .map(|tenant| format!("tenant:{}", tenant))
/// });
/// ```
pub struct KeyFn<F> {
    name: &'static str,
    f: F,
}

pub fn key_fn<F>(name: &'static str, f: F) -> KeyFn<F>
where
    F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
{
    KeyFn { name, f }
}

#[async_trait]
impl<F> KeyStrategy for KeyFn<F>
where
    F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn key(&self, request: &mut Request) -> Option<String> {
        (self.f)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn test_key_fn() {
        let strategy = key_fn("tenant", |req| {
            req.headers()
                .get("x-tenant-id")
                .and_then(|v| v.to_str().ok())
                .map(|tenant| format!("tenant:{}", tenant))
        });
        assert_eq!(strategy.name(), "tenant");

        let mut req = Request::builder()
            .header("x-tenant-id", "acme")
            .body(Body::empty())
            .unwrap();
        assert_eq!(strategy.key(&mut req).await, Some("tenant:acme".to_string()));

        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(strategy.key(&mut req).await, None);
    }
}
