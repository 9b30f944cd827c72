//! Rate limiting layer backed by the shared store
//!
//! Each wrapped route gets its own rule, key strategy and denial response:
//! - Keys are derived per request by a [`KeyStrategy`]
//! - Buckets live in the shared store, so limits hold across processes
//! - Store failures fail open and are flagged with `x-ratelimit-error`

use super::config::BucketRule;
use super::limiter::{Decision, TokenBucketLimiter};
use super::responder::{DenialResponder, TooManyRequests};
use crate::error::Result;
use crate::keys::{ClientAddress, KeyStrategy};
use crate::store::StoreHandle;
use axum::{
    extract::Request,
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::{Layer, Service};

/// Response header set when a request was let through because the store failed
pub const RATE_LIMIT_ERROR_HEADER: &str = "x-ratelimit-error";

const DEFAULT_NAMESPACE: &str = "rl:tb";

struct RateLimitState {
    limiter: TokenBucketLimiter,
    rule: BucketRule,
    strategy: Arc<dyn KeyStrategy>,
    responder: Arc<dyn DenialResponder>,
    namespace: String,
    scope: Option<String>,
}

impl RateLimitState {
    /// Store key for a strategy key: `{namespace}[:{scope}]:{key}`
    fn bucket_key(&self, key: &str) -> String {
        match &self.scope {
            Some(scope) => format!("{}:{}:{}", self.namespace, scope, key),
            None => format!("{}:{}", self.namespace, key),
        }
    }
}

/// Tower layer for rate limiting
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, routing::post};
/// use floodgate::keys::ClientAddress;
/// use floodgate::ratelimit::{BucketRule, RateLimitLayer};
///
/// let app = Router::new()
///     .route("/api/login", post(login))
///     .route_layer(
///         RateLimitLayer::builder(BucketRule::login(), store.clone())
///             .key_by(ClientAddress::new())
///             .scope("login")
///             .build(),
///     );
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
}

impl RateLimitLayer {
    /// Limit by `strategy` under `rule`, answering denials with a plain `429`
    pub fn new(rule: BucketRule, strategy: impl KeyStrategy, store: StoreHandle) -> Self {
        Self::builder(rule, store).key_by(strategy).build()
    }

    pub fn builder(rule: BucketRule, store: StoreHandle) -> RateLimitLayerBuilder {
        RateLimitLayerBuilder::new(rule, store)
    }

    pub fn rule(&self) -> &BucketRule {
        &self.state.rule
    }
}

/// Wrap a route in a rate limit built from raw limits
///
/// Fails with a configuration error for non-positive limits, so invalid
/// wiring is caught before the server starts.
pub fn rate_limit(
    capacity: u32,
    refill_per_second: f64,
    ttl_seconds: u64,
    strategy: impl KeyStrategy,
    store: StoreHandle,
) -> Result<RateLimitLayer> {
    let rule = BucketRule::new(capacity, refill_per_second, ttl_seconds)?;
    Ok(RateLimitLayer::new(rule, strategy, store))
}

/// Builder for [`RateLimitLayer`]
#[must_use = "builder does nothing until you call build()"]
pub struct RateLimitLayerBuilder {
    rule: BucketRule,
    store: StoreHandle,
    strategy: Arc<dyn KeyStrategy>,
    responder: Arc<dyn DenialResponder>,
    namespace: String,
    scope: Option<String>,
}

impl RateLimitLayerBuilder {
    fn new(rule: BucketRule, store: StoreHandle) -> Self {
        Self {
            rule,
            store,
            strategy: Arc::new(ClientAddress::new()),
            responder: Arc::new(TooManyRequests),
            namespace: DEFAULT_NAMESPACE.to_string(),
            scope: None,
        }
    }

    pub fn key_by(mut self, strategy: impl KeyStrategy) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    pub fn respond_with(mut self, responder: impl DenialResponder) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    /// Prefix for every bucket key (default `rl:tb`)
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Separate this route's buckets from other routes using the same strategy
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn build(self) -> RateLimitLayer {
        RateLimitLayer {
            state: Arc::new(RateLimitState {
                limiter: TokenBucketLimiter::new(self.store),
                rule: self.rule,
                strategy: self.strategy,
                responder: self.responder,
                namespace: self.namespace,
                scope: self.scope,
            }),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Tower service for rate limiting
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let state = self.state.clone();
        let mut svc = self.inner.clone();

        Box::pin(async move {
            let key = state
                .strategy
                .key(&mut req)
                .await
                .filter(|key| !key.trim().is_empty());

            // No key: this request is exempt
            let Some(key) = key else {
                let response = svc.call(req).await?;
                return Ok(response.into_response());
            };

            let bucket_key = state.bucket_key(&key);
            match state.limiter.check(&bucket_key, &state.rule).await {
                Decision::Allowed => {
                    let response = svc.call(req).await?;
                    Ok(response.into_response())
                }
                Decision::Denied => {
                    tracing::info!(
                        target: "floodgate.ratelimit.denied",
                        key = %bucket_key,
                        strategy = state.strategy.name(),
                        method = %req.method(),
                        path = %req.uri().path(),
                        "Rate limit exceeded"
                    );
                    Ok(state.responder.respond(&req))
                }
                Decision::Degraded { reason } => {
                    let mut response = svc.call(req).await?.into_response();
                    response.headers_mut().insert(
                        RATE_LIMIT_ERROR_HEADER,
                        HeaderValue::from_static(reason.kind()),
                    );
                    Ok(response)
                }
            }
        })
    }
}
