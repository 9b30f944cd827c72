use crate::error::{FloodgateError, Result};
use crate::ratelimit::BucketRequest;
use crate::traits::store::CounterStore;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Script;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Refill, check and consume a bucket in one step.
///
/// KEYS[1] bucket hash, ARGV: now, capacity, refill rate, requested, ttl.
/// Returns 1 when allowed, 0 when denied. A denial still stores the refilled
/// tokens and the new timestamp. Tokens are written with 17 significant
/// digits so partial refills round-trip exactly.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate = tonumber(ARGV[3])
local requested = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local stored = redis.call('HMGET', KEYS[1], 'tokens', 'last')
local tokens = tonumber(stored[1])
local last = tonumber(stored[2])
if tokens == nil or last == nil then
  tokens = capacity
  last = now
end

local elapsed = math.max(0, now - last)
tokens = math.max(0, math.min(capacity, tokens + elapsed * rate))

local allowed = 0
if tokens >= requested then
  tokens = tokens - requested
  allowed = 1
end

redis.call('HSET', KEYS[1], 'tokens', string.format('%.17g', tokens), 'last', tostring(now))
redis.call('EXPIRE', KEYS[1], ttl)
return allowed
"#;

/// Increment a counter and start its window on the first increment.
///
/// KEYS[1] counter, ARGV[1] window in seconds. Returns the new count.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis-backed counter store
///
/// Both the bucket evaluation and the counter increment run as Lua scripts,
/// so each check is a single atomic round trip no matter how many processes
/// share the server. Scripts are sent with `EVALSHA` and transparently
/// re-sent with `EVAL` when the server has not cached them yet.
///
/// The connection is opened on first use. An unreachable server therefore
/// never blocks startup; every call fails with a store error until the
/// server comes back.
pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    token_bucket: Script,
    increment: Script,
}

impl RedisStore {
    /// Create a store from a connection URL such as `redis://127.0.0.1:6379/0`
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            FloodgateError::configuration(format!("Invalid Redis URL: {}", e))
        })?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            token_bucket: Script::new(TOKEN_BUCKET_SCRIPT),
            increment: Script::new(INCREMENT_SCRIPT),
        })
    }

    /// Create a store from a `host:port` address and an optional password
    pub fn from_addr(addr: &str, password: Option<&str>) -> Result<Self> {
        let mut url = url::Url::parse(&format!("redis://{}", addr.trim())).map_err(|e| {
            FloodgateError::configuration(format!("Invalid Redis address '{}': {}", addr, e))
        })?;

        if let Some(password) = password.filter(|p| !p.is_empty()) {
            url.set_password(Some(password)).map_err(|_| {
                FloodgateError::configuration(format!(
                    "Redis address '{}' cannot carry a password",
                    addr
                ))
            })?;
        }

        Self::new(url.as_str())
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                // One attempt per call: the caller's timeout is the only retry budget
                let config = ConnectionManagerConfig::new().set_number_of_retries(1);
                let manager =
                    ConnectionManager::new_with_config(self.client.clone(), config).await?;
                tracing::info!(target: "floodgate.store.connected", "Connected to Redis");
                Ok::<_, FloodgateError>(manager)
            })
            .await?;

        Ok(manager.clone())
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn take_tokens(&self, key: &str, request: &BucketRequest) -> Result<bool> {
        let mut conn = self.connection().await?;

        let allowed: i64 = self
            .token_bucket
            .key(key)
            .arg(request.now)
            .arg(request.capacity)
            .arg(request.refill_rate)
            .arg(request.requested)
            .arg(request.ttl_seconds())
            .invoke_async(&mut conn)
            .await?;

        match allowed {
            1 => Ok(true),
            0 => Ok(false),
            other => Err(FloodgateError::store_protocol(format!(
                "Token bucket script returned {}",
                other
            ))),
        }
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        let mut conn = self.connection().await?;

        let count: i64 = self
            .increment
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn counter(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.connection().await?;

        let value: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;

        redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Round-trip a `PING` to check that the server is reachable
    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;

        if reply != "PONG" {
            return Err(FloodgateError::store_protocol(format!(
                "Unexpected PING reply: {}",
                reply
            )));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
