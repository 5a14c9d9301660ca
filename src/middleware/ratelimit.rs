//! Per-client-IP token-bucket rate limiting.
//!
//! Each IP gets a bucket refilled at `requests_per_minute / 60` tokens per
//! second up to `burst`. The bucket map sits behind a readers-writer lock;
//! a background sweeper evicts entries idle for more than 30 minutes every
//! 10 minutes so the map cannot grow without bound.

use super::client_ip;
use crate::error::ErrorTag;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub window: Duration,
    pub whitelist_ips: Vec<String>,
    pub blacklist_ips: Vec<String>,
    pub skip_paths: Vec<&'static str>,
    pub custom_message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10,
            window: Duration::from_secs(60),
            whitelist_ips: Vec::new(),
            blacklist_ips: Vec::new(),
            skip_paths: vec!["/health", "/favicon.ico"],
            custom_message: "Rate limit exceeded. Please try again later.".to_string(),
        }
    }
}

struct IpBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
    window_start: DateTime<Utc>,
}

/// Outcome of a rate check, carrying everything the response headers need.
#[derive(Debug)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub retry_after_seconds: u64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, IpBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Consume one token for `ip` if available.
    pub fn check(&self, ip: &str) -> RateDecision {
        let mut buckets = self.buckets.write().expect("rate limiter lock poisoned");
        let now = Instant::now();
        let wall_now = Utc::now();

        let burst = self.config.burst as f64;

        let bucket = buckets.entry(ip.to_string()).or_insert_with(|| IpBucket {
            tokens: burst,
            last_refill: now,
            last_seen: now,
            window_start: wall_now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let rate = self.config.requests_per_minute as f64 / self.config.window.as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        if wall_now - bucket.window_start >= window {
            bucket.window_start = wall_now;
        }

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }

        let remaining = bucket.tokens.floor().max(0.0) as u32;
        let reset_at = bucket.window_start + window;
        let retry_after = (reset_at - wall_now).num_seconds();
        let retry_after_seconds = if retry_after > 0 {
            retry_after as u64
        } else {
            self.config.window.as_secs()
        };

        RateDecision {
            allowed,
            limit: self.config.requests_per_minute,
            remaining,
            reset_at,
            retry_after_seconds,
        }
    }

    pub fn is_whitelisted(&self, ip: &str) -> bool {
        self.config.whitelist_ips.iter().any(|w| w == ip)
    }

    pub fn is_blacklisted(&self, ip: &str) -> bool {
        self.config.blacklist_ips.iter().any(|b| b == ip)
    }

    fn should_skip(&self, path: &str) -> bool {
        self.config.skip_paths.contains(&path)
    }

    /// Drop buckets idle for more than `idle_for`.
    pub fn sweep(&self, idle_for: Duration) -> usize {
        let mut buckets = self.buckets.write().expect("rate limiter lock poisoned");
        let now = Instant::now();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) <= idle_for);
        before - buckets.len()
    }

    pub fn active_count(&self) -> usize {
        self.buckets.read().expect("rate limiter lock poisoned").len()
    }

    /// Background eviction loop: every 10 minutes, drop entries idle > 30
    /// minutes.
    pub fn spawn_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(600));
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = limiter.sweep(Duration::from_secs(1800));
                tracing::debug!(
                    evicted,
                    active_limiters = limiter.active_count(),
                    "rate limiter cleanup completed"
                );
            }
        })
    }
}

fn set_rate_headers(response: &mut Response<Body>, decision: &RateDecision, window: Duration) {
    let headers = response.headers_mut();
    let mut set = |name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    };
    set("X-RateLimit-Limit", decision.limit.to_string());
    set("X-RateLimit-Remaining", decision.remaining.to_string());
    set("X-RateLimit-Reset", decision.reset_at.timestamp().to_string());
    set("X-RateLimit-Window", format!("{}s", window.as_secs()));
}

pub async fn rate_limit(limiter: Arc<RateLimiter>, req: Request, next: Next) -> Response<Body> {
    let path = req.uri().path();
    if limiter.should_skip(path) {
        return next.run(req).await;
    }

    let ip = client_ip(&req);

    if limiter.is_blacklisted(&ip) {
        tracing::warn!(client_ip = %ip, "request blocked: IP blacklisted");
        let mut response = (
            StatusCode::FORBIDDEN,
            axum::Json(json!({
                "success": false,
                "error": "IP address is blacklisted",
                "code": 403,
            })),
        )
            .into_response();
        response.extensions_mut().insert(ErrorTag {
            message: "IP address is blacklisted".to_string(),
            kind: "authorization",
            finalized: false,
        });
        return response;
    }

    if limiter.is_whitelisted(&ip) {
        return next.run(req).await;
    }

    let decision = limiter.check(&ip);
    let window = limiter.config().window;

    if !decision.allowed {
        tracing::warn!(client_ip = %ip, "request blocked: rate limit exceeded");

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(json!({
                "success": false,
                "error": limiter.config().custom_message,
                "code": 429,
                "retry_after_seconds": decision.retry_after_seconds,
                "rate_limit": {
                    "limit": decision.limit,
                    "remaining": decision.remaining,
                    "reset_at": decision.reset_at.timestamp(),
                    "window": format!("{}s", window.as_secs()),
                },
            })),
        )
            .into_response();

        set_rate_headers(&mut response, &decision, window);
        if let Ok(value) = HeaderValue::from_str(&decision.retry_after_seconds.to_string()) {
            response.headers_mut().insert("Retry-After", value);
        }
        // Body already carries the full detail payload.
        response.extensions_mut().insert(ErrorTag {
            message: limiter.config().custom_message.clone(),
            kind: "rate_limited",
            finalized: true,
        });
        return response;
    }

    let mut response = next.run(req).await;
    set_rate_headers(&mut response, &decision, window);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_minute: per_minute,
            burst,
            ..Default::default()
        })
    }

    #[test]
    fn test_burst_then_denial() {
        let limiter = limiter(60, 10);

        for i in 0..10 {
            let decision = limiter.check("203.0.113.5");
            assert!(decision.allowed, "request {i} within burst should pass");
        }

        let denied = limiter.check("203.0.113.5");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after_seconds > 0);
    }

    #[test]
    fn test_independent_buckets_per_ip() {
        let limiter = limiter(60, 1);

        assert!(limiter.check("10.0.0.1").allowed);
        assert!(!limiter.check("10.0.0.1").allowed);
        assert!(limiter.check("10.0.0.2").allowed);
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let limiter = limiter(60, 10);
        limiter.check("10.0.0.1");
        limiter.check("10.0.0.2");
        assert_eq!(limiter.active_count(), 2);

        // Nothing is idle yet.
        assert_eq!(limiter.sweep(Duration::from_secs(1800)), 0);
        // Everything is "idle" with a zero threshold.
        assert_eq!(limiter.sweep(Duration::ZERO), 2);
        assert_eq!(limiter.active_count(), 0);
    }

    #[test]
    fn test_white_and_blacklist() {
        let limiter = RateLimiter::new(RateLimitConfig {
            whitelist_ips: vec!["1.1.1.1".to_string()],
            blacklist_ips: vec!["2.2.2.2".to_string()],
            ..Default::default()
        });
        assert!(limiter.is_whitelisted("1.1.1.1"));
        assert!(!limiter.is_whitelisted("9.9.9.9"));
        assert!(limiter.is_blacklisted("2.2.2.2"));
    }
}
