//! API Middleware (Admin Auth, Rate Limiting, Logging)

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::handlers::AppState;
use super::types::{ApiError, ApiResponse};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rate limiter configuration
pub struct RateLimitConfig {
    /// Requests per window
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(60),
        }
    }
}

/// Fixed-window limiter keyed by client address (or the admin identity)
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    /// Returns (allowed, remaining, reset_seconds)
    pub fn check(&self, key: &str) -> (bool, u32, u64) {
        let now = Instant::now();

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) > self.config.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= self.config.requests_per_window {
            return (false, 0, reset_secs);
        }

        entry.0 += 1;
        (true, self.config.requests_per_window - entry.0, reset_secs)
    }

    /// Drop windows that ended long ago; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests
            .retain(|_, (_, started)| now.duration_since(*started) < self.config.window_duration * 2);
        before.saturating_sub(self.requests.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

lazy_static::lazy_static! {
    pub static ref RATE_LIMITER: Arc<RateLimiter> = Arc::new(RateLimiter::default());
}

/// Periodically prune the global rate limiter
pub fn start_cleanup_task() {
    tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let removed = RATE_LIMITER.cleanup();
            if removed > 0 {
                info!("🧹 Rate limiter cleanup: {} stale keys removed", removed);
            }
        }
    });
}

fn is_health(path: &str) -> bool {
    path == "/health" || path == "/v1/health"
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

/// Equality whose running time depends only on the lengths
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn is_admin(given: Option<&str>, expected: Option<&str>) -> bool {
    match (given, expected) {
        (Some(given), Some(expected)) => constant_time_eq(given.as_bytes(), expected.as_bytes()),
        _ => false,
    }
}

/// Bucket for one request. Forwarding headers are client-controlled, so
/// they only count when the server sits behind a trusted proxy; otherwise
/// the TCP peer decides. Unknown API keys never get their own bucket.
pub fn rate_key(headers: &HeaderMap, peer: Option<SocketAddr>, admin_key: Option<&str>, trust_forwarded: bool) -> String {
    if is_admin(api_key(headers), admin_key) {
        return "admin".to_string();
    }
    let forwarded = trust_forwarded
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        })
        .flatten();

    match forwarded.or_else(|| peer.map(|p| p.ip().to_string())) {
        Some(ip) => format!("ip:{}", ip),
        None => "anonymous".to_string(),
    }
}

fn reject(status: StatusCode, error: ApiError, start: Instant) -> Response {
    (
        status,
        Json(ApiResponse::error(error, start.elapsed().as_secs_f64() * 1000.0)),
    )
        .into_response()
}

/// Denylist mutations require `X-API-Key` equal to the configured admin key.
/// Without a configured key every mutation is refused.
pub async fn admin_auth_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mutating = matches!(*request.method(), Method::POST | Method::DELETE | Method::PUT);
    if !mutating || !request.uri().path().starts_with("/v1/denylist") {
        return next.run(request).await;
    }

    let expected = state.engine.config().api.admin_key.as_deref();
    let given = api_key(request.headers()).map(str::to_string);
    match given {
        Some(given) if is_admin(Some(given.as_str()), expected) => next.run(request).await,
        None => reject(StatusCode::UNAUTHORIZED, ApiError::forbidden(), start),
        Some(_) => {
            warn!(path = %request.uri().path(), "🔒 Denylist mutation with invalid admin key");
            reject(StatusCode::FORBIDDEN, ApiError::forbidden(), start)
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    if is_health(request.uri().path()) {
        return next.run(request).await;
    }

    let api = &state.engine.config().api;
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = rate_key(request.headers(), peer, api.admin_key.as_deref(), api.trust_forwarded_for);

    let (allowed, remaining, reset) = RATE_LIMITER.check(&key);

    if !allowed {
        warn!(key = %key, "⏳ Rate limit exceeded");
        return reject(StatusCode::TOO_MANY_REQUESTS, ApiError::rate_limited(reset), start);
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-remaining", remaining.into());
    headers.insert("x-ratelimit-reset", reset.into());

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri.path(),
        status = %response.status().as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 2,
            window_duration: Duration::from_secs(60),
        });
        assert_eq!(limiter.check("k").0, true);
        let (allowed, remaining, _) = limiter.check("k");
        assert!(allowed);
        assert_eq!(remaining, 0);
        assert!(!limiter.check("k").0);
        assert!(limiter.check("other").0);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cret-longer"));
        assert!(constant_time_eq(b"", b""));
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_forwarded_headers_ignored_unless_trusted() {
        let peer: SocketAddr = "203.0.113.7:5555".parse().unwrap();
        let spoofed = headers(&[("x-forwarded-for", "1.2.3.4, 10.0.0.1")]);

        assert_eq!(rate_key(&spoofed, Some(peer), None, false), "ip:203.0.113.7");
        assert_eq!(rate_key(&spoofed, Some(peer), None, true), "ip:1.2.3.4");
        assert_eq!(
            rate_key(&headers(&[("x-real-ip", "5.6.7.8")]), Some(peer), None, true),
            "ip:5.6.7.8"
        );
        assert_eq!(rate_key(&HeaderMap::new(), None, None, false), "anonymous");
    }

    #[test]
    fn test_random_api_keys_share_the_client_bucket() {
        let peer: SocketAddr = "203.0.113.7:5555".parse().unwrap();
        let a = rate_key(&headers(&[(API_KEY_HEADER, "random-1")]), Some(peer), Some("admin"), false);
        let b = rate_key(&headers(&[(API_KEY_HEADER, "random-2")]), Some(peer), Some("admin"), false);
        assert_eq!(a, b);
        assert_eq!(
            rate_key(&headers(&[(API_KEY_HEADER, "admin")]), Some(peer), Some("admin"), false),
            "admin"
        );
    }

    #[test]
    fn test_cleanup_keeps_fresh_windows() {
        let limiter = RateLimiter::default();
        limiter.check("k");
        assert_eq!(limiter.cleanup(), 0);
    }
}
