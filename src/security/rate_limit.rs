//! Per-client token bucket rate limiting.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::json;

use crate::auth::credential;
use crate::config::RateLimitConfig;
use crate::observability::{logging::mask_credential, metrics};

/// Continuous-refill token bucket for one client key.
#[derive(Debug, Clone)]
struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    burst: u32,
}

impl ClientBucket {
    fn new(rate: f64, burst: u32, now: Instant) -> Self {
        Self {
            tokens: burst as f64,
            last_refill: now,
            rate,
            burst,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Keyed token bucket limiter.
///
/// The key map is an LRU bounded by `max_clients`; the least recently seen
/// client is forgotten first and starts again with a full bucket.
pub struct RateLimiter {
    buckets: Mutex<LruCache<String, ClientBucket>>,
    rate: f64,
    burst: u32,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: u32, max_clients: usize) -> Self {
        let capacity = NonZeroUsize::new(max_clients).unwrap_or(NonZeroUsize::MIN);
        Self {
            buckets: Mutex::new(LruCache::new(capacity)),
            rate,
            burst,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size, config.max_clients)
    }

    /// Consume one token for `key`. First sight of a key creates a full bucket.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get_mut(key) {
            return bucket.try_acquire(now);
        }

        let mut bucket = ClientBucket::new(self.rate, self.burst, now);
        let allowed = bucket.try_acquire(now);
        buckets.put(key.to_string(), bucket);
        allowed
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Middleware state: the shared limiter plus the route group namespace.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub group: &'static str,
}

/// Client address: connection peer, else `X-Real-Ip`, else the first
/// `X-Forwarded-For` hop.
pub fn client_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> Option<String> {
    peer.map(|addr| addr.ip().to_string())
        .or_else(|| credential::header_value(headers, "X-Real-Ip"))
        .or_else(|| {
            credential::header_value(headers, "X-Forwarded-For").and_then(|chain| {
                chain
                    .split(',')
                    .map(str::trim)
                    .find(|hop| !hop.is_empty())
                    .map(str::to_owned)
            })
        })
}

/// Limiter key: `group|ip`, suffixed with `:credential` when one is presented.
pub fn client_key(group: &str, ip: &str, credential: Option<&str>) -> String {
    match credential {
        Some(credential) => format!("{group}|{ip}:{credential}"),
        None => format!("{group}|{ip}"),
    }
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let headers = request.headers();
    let ip = client_ip(peer, headers).unwrap_or_else(|| "unknown".to_string());
    // Same precedence the strategies use, so a query-string token gets its own bucket.
    let presented = credential::by_precedence(headers, request.uri()).map(|(value, _)| value);
    let key = client_key(state.group, &ip, presented.as_deref());

    if state.limiter.allow(&key) {
        return next.run(request).await;
    }

    tracing::warn!(
        client_ip = %ip,
        authorization = %mask_credential(presented.as_deref()),
        group = state.group,
        "Rate limit exceeded"
    );
    metrics::record_rate_limited(state.group);
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "Rate limit exceeded" })),
    )
        .into_response()
}
