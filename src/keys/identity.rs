use super::{ClientAddress, KeyStrategy};
use async_trait::async_trait;
use axum::extract::Request;

/// The signed-in user of a request
///
/// Inserted into the request extensions by the application's authentication
/// layer. The value is whatever uniquely names the user (email or id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// Keys requests by authenticated user
///
/// Produces `user:{identity}` with the identity trimmed and lower-cased.
/// Anonymous requests are keyed by [`ClientAddress`] instead, unless the
/// fallback is turned off, in which case they are not limited at all.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedIdentity {
    fallback: Option<ClientAddress>,
}

impl AuthenticatedIdentity {
    pub fn new() -> Self {
        Self {
            fallback: Some(ClientAddress::new()),
        }
    }

    /// Use a specific address strategy for anonymous requests
    #[must_use]
    pub fn with_fallback(mut self, fallback: ClientAddress) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Leave anonymous requests unlimited
    #[must_use]
    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }
}

impl Default for AuthenticatedIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStrategy for AuthenticatedIdentity {
    fn name(&self) -> &'static str {
        "user"
    }

    async fn key(&self, request: &mut Request) -> Option<String> {
        let user = request
            .extensions()
            .get::<Identity>()
            .map(|Identity(user)| user.trim().to_lowercase())
            .filter(|user| !user.is_empty());

        match user {
            Some(user) => Some(format!("user:{}", user)),
            None => self.fallback.and_then(|address| address.resolve(request)),
        }
    }
}
