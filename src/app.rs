use crate::auth::lockout::{FailedLoginTracker, LockoutPolicy};
use crate::config::FloodgateConfig;
use crate::error::Result;
use crate::ratelimit::{BucketRule, RateLimitLayer, RateLimitLayerBuilder};
use crate::store::StoreHandle;

/// Shared abuse-prevention state for an application
///
/// Holds the store handle, the key namespace and the lockout policy, so
/// every route layer and the login handler share one store. Cloning is
/// cheap.
///
/// # Example
///
/// ```rust,ignore
/// use floodgate::{Floodgate, FloodgateConfigBuilder};
/// use floodgate::keys::{AuthenticatedIdentity, ClientAddress};
/// use floodgate::ratelimit::BucketRule;
///
/// let config = FloodgateConfigBuilder::new().from_env().build()?;
/// let floodgate = Floodgate::connect(&config).await?;
///
/// let app = Router::new()
///     .route("/api/signup", post(signup))
///     .route_layer(floodgate.limit(BucketRule::signup()).scope("signup").build())
///     .merge(
///         Router::new()
///             .route("/api/tasks", post(add_task))
///             .route_layer(
///                 floodgate
///                     .limit(BucketRule::task_mutation())
///                     .key_by(AuthenticatedIdentity::new())
///                     .build(),
///             ),
///     );
/// ```
#[derive(Clone, Debug)]
pub struct Floodgate {
    store: StoreHandle,
    namespace: String,
    policy: LockoutPolicy,
}

impl Floodgate {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            namespace: "rl:tb".to_string(),
            policy: LockoutPolicy::default(),
        }
    }

    /// Build from configuration without touching the network
    pub fn from_config(config: &FloodgateConfig) -> Result<Self> {
        Ok(Self {
            store: StoreHandle::from_config(&config.store)?,
            namespace: config.store.key_namespace.clone(),
            policy: config.lockout.policy()?,
        })
    }

    /// Build from configuration and probe the store once.
    ///
    /// An unreachable store is logged and tolerated: the returned instance
    /// fails open until the store answers.
    pub async fn connect(config: &FloodgateConfig) -> Result<Self> {
        let floodgate = Self::from_config(config)?;
        let _ = floodgate.store.ping().await;
        Ok(floodgate)
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_lockout_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Start a rate-limit layer on the shared store
    pub fn limit(&self, rule: BucketRule) -> RateLimitLayerBuilder {
        RateLimitLayer::builder(rule, self.store.clone()).namespace(self.namespace.clone())
    }

    /// Failed-login tracker on the shared store
    pub fn login_tracker(&self) -> FailedLoginTracker {
        FailedLoginTracker::new(self.store.clone(), self.policy)
    }
}
