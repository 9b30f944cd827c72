//! Token-bucket rate limiting.
//!
//! Buckets live in the shared store and are evaluated atomically there, so a
//! limit holds across every process serving the application. Routes opt in
//! individually by wrapping themselves in a [`RateLimitLayer`].

mod bucket;
mod config;
mod layer;
mod limiter;
mod responder;

pub use bucket::{BucketRequest, BucketState};
pub use config::BucketRule;
pub use layer::{
    RATE_LIMIT_ERROR_HEADER, RateLimitLayer, RateLimitLayerBuilder, RateLimitService, rate_limit,
};
pub use limiter::{Decision, TokenBucketLimiter};
pub use responder::{DenialResponder, FragmentAware, InlineMessage, TooManyRequests};
