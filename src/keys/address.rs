use super::KeyStrategy;
use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

static MISSING_ADDRESS_REPORTED: AtomicBool = AtomicBool::new(false);

/// Keys requests by client IP address
///
/// # Security
///
/// By default the leftmost `X-Forwarded-For` entry is trusted, then
/// `X-Real-IP`, then the peer address from `ConnectInfo`. This is only
/// correct behind a reverse proxy that overwrites those headers; otherwise a
/// client can pick any address and bypass per-address limits. Services that
/// accept connections directly should use [`ClientAddress::direct`].
///
/// The peer address requires serving the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Requests without
/// any resolvable address are not limited, and the first one logs a warning
/// under `floodgate.keys.address`.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddress {
    trust_proxy_headers: bool,
}

impl ClientAddress {
    /// Resolve through proxy headers, then the peer address
    pub fn new() -> Self {
        Self {
            trust_proxy_headers: true,
        }
    }

    /// Only use the peer address, ignoring proxy headers
    pub fn direct() -> Self {
        Self {
            trust_proxy_headers: false,
        }
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    /// The client address of `request`, if one can be determined
    pub fn resolve(&self, request: &Request) -> Option<String> {
        let headers = request.headers();

        let forwarded = || {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                // "client, proxy1, proxy2": the leftmost entry is the client
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let peer = || {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        let address = if self.trust_proxy_headers {
            forwarded().or_else(real_ip).or_else(peer)
        } else {
            peer()
        };

        if address.is_none() {
            report_missing_address();
        }
        address
    }
}

/// Warn once per process that a request arrived without any client address.
///
/// Returns whether this call emitted the warning.
fn report_missing_address() -> bool {
    if MISSING_ADDRESS_REPORTED.swap(true, Ordering::Relaxed) {
        return false;
    }

    tracing::warn!(
        target: "floodgate.keys.address",
        "No client address on request; address-keyed limits are skipped. \
         Serve the router with into_make_service_with_connect_info::<SocketAddr>()"
    );
    true
}

impl Default for ClientAddress {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStrategy for ClientAddress {
    fn name(&self) -> &'static str {
        "ip"
    }

    async fn key(&self, request: &mut Request) -> Option<String> {
        self.resolve(request)
    }
}
