//! HTTP middleware chain.
//!
//! Assembled outermost-first in the gateway: error envelope (with panic
//! guard) → validation → metrics → CORS → request logger → security
//! headers → rate limiter → authentication → RBAC → handler.

pub mod auth;
pub mod cors;
pub mod error;
pub mod metrics;
pub mod ratelimit;
pub mod rbac;
pub mod request_log;
pub mod security;
pub mod validation;

use axum::extract::ConnectInfo;
use axum::http::Request;
use std::net::SocketAddr;

/// Resolve the real client IP: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then `CF-Connecting-IP`, then the peer address without its
/// port.
pub fn client_ip<B>(req: &Request<B>) -> String {
    let headers = req.headers();

    if let Some(xff) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(xri) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
        if !xri.is_empty() {
            return xri.to_string();
        }
    }

    if let Some(cf) = headers.get("CF-Connecting-IP").and_then(|v| v.to_str().ok()) {
        if !cf.is_empty() {
            return cf.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: &str, value: &str) -> Request<Body> {
        Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for_first_entry() {
        let req = request_with_header("X-Forwarded-For", "203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_through_headers() {
        let req = request_with_header("X-Real-IP", "198.51.100.4");
        assert_eq!(client_ip(&req), "198.51.100.4");

        let req = request_with_header("CF-Connecting-IP", "192.0.2.7");
        assert_eq!(client_ip(&req), "192.0.2.7");
    }

    #[test]
    fn test_client_ip_uses_peer_address_without_port() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("203.0.113.1:45000".parse().unwrap()));
        assert_eq!(client_ip(&req), "203.0.113.1");
    }

    #[test]
    fn test_client_ip_unknown_without_any_source() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
