//! Rate limiting and other middleware.

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Key shared by requests whose origin cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Tracked keys before idle entries are purged.
const PURGE_THRESHOLD: usize = 10_000;

/// Client key paired with the index of the window it falls in.
type WindowKey = (String, u64);

/// Per-client rate limiter keyed by address and window.
pub type ClientLimiter = DefaultKeyedRateLimiter<WindowKey>;

/// Rate limiter state shared across requests.
///
/// Windows are fixed and shared by all clients: they start when the limiter
/// is created and every client gets a fresh allowance at each boundary.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<ClientLimiter>,
    window: Duration,
    started: Instant,
    trust_forwarded_for: bool,
}

impl RateLimitState {
    /// Allow `max_attempts` requests per client in each `window`.
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_attempts).unwrap_or(NonZeroU32::MIN);
        let window = window.max(Duration::from_millis(1));
        // A spent attempt only comes back after a whole window, by which
        // time the client is counted under the next window's key.
        let quota = Quota::with_period(window)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            window,
            started: Instant::now(),
            trust_forwarded_for: false,
        }
    }

    /// Create the limiter described by configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_attempts, config.window)
            .trust_forwarded_for(config.trust_forwarded_for)
    }

    /// Key clients by the first `X-Forwarded-For` entry when present.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Create a permissive rate limiter for testing.
    pub fn permissive() -> Self {
        Self::new(1000, Duration::from_secs(1))
    }

    /// Record an attempt for `key`.
    ///
    /// Returns the number of seconds until the current window ends when the
    /// client is over its quota.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let elapsed = self.started.elapsed().as_nanos();
        let window = self.window.as_nanos();
        let index = (elapsed / window) as u64;

        let result = match self.limiter.check_key(&(key.to_string(), index)) {
            Ok(()) => Ok(()),
            Err(_) => {
                let remaining = Duration::from_nanos((window - elapsed % window) as u64);
                Err((remaining.as_secs_f64().ceil() as u64).max(1))
            }
        };

        if self.limiter.len() > PURGE_THRESHOLD {
            self.limiter.retain_recent();
        }

        result
    }

    /// Derive the limiter key for a request.
    pub fn client_key(&self, request: &Request) -> String {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return client.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// Rate limiting middleware.
///
/// Rejects over-quota clients with 429 before the request body is looked at.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let client = rate_limit.client_key(&request);

    if let Err(retry_after_secs) = rate_limit.check(&client) {
        warn!(%client, retry_after_secs, "Registration rate limit exceeded");
        return Err(GatewayError::RateLimitExceeded { retry_after_secs });
    }

    debug!(%client, "Rate limit check passed");
    Ok(next.run(request).await)
}

/// Logging middleware for requests.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    debug!(%method, %uri, "Request started");

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_success() {
        debug!(%method, %uri, %status, ?duration, "Request completed");
    } else {
        warn!(%method, %uri, %status, ?duration, "Request failed");
    }

    response
}
