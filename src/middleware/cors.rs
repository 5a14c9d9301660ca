//! CORS handling with exact and `*.domain` suffix origin matching.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, Response, StatusCode};
use axum::middleware::Next;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<&'static str>,
    pub allowed_headers: Vec<&'static str>,
    pub exposed_headers: Vec<&'static str>,
    pub allow_credentials: bool,
    pub max_age: u32,
}

impl CorsConfig {
    pub fn default_config() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:3001".to_string(),
            ],
            allowed_methods: vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"],
            allowed_headers: vec![
                "Authorization",
                "Content-Type",
                "Accept",
                "Origin",
                "User-Agent",
                "X-Requested-With",
            ],
            exposed_headers: vec!["Content-Length", "Content-Type", "X-Request-ID"],
            allow_credentials: true,
            max_age: 86_400,
        }
    }

    pub fn production(allowed_domains: Vec<String>) -> Self {
        Self {
            allowed_origins: allowed_domains,
            allowed_methods: vec!["GET", "POST", "PUT", "PATCH", "DELETE"],
            allowed_headers: vec!["Authorization", "Content-Type", "Accept"],
            exposed_headers: vec!["Content-Length", "X-Request-ID"],
            allow_credentials: true,
            max_age: 3_600,
        }
    }
}

/// Exact match, or suffix match for `*.domain` patterns.
fn is_allowed_origin(origin: &str, allowed: &[String]) -> bool {
    for candidate in allowed {
        if candidate == origin {
            return true;
        }
        if let Some(domain) = candidate.strip_prefix("*.") {
            if origin.ends_with(&format!(".{domain}")) || origin == domain {
                return true;
            }
        }
    }
    false
}

pub async fn cors(config: Arc<CorsConfig>, req: Request, next: Next) -> Response<Body> {
    let origin = req
        .headers()
        .get("Origin")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let is_preflight = req.method() == Method::OPTIONS;

    let mut response = if is_preflight {
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::empty())
            .expect("static response")
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();

    if let Some(origin) = &origin {
        if is_allowed_origin(origin, &config.allowed_origins) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert("Access-Control-Allow-Origin", value);
            }
        }
    }

    let insert_list = |headers: &mut axum::http::HeaderMap, name: &'static str, list: &[&str]| {
        if !list.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&list.join(", ")) {
                headers.insert(name, value);
            }
        }
    };

    insert_list(headers, "Access-Control-Allow-Methods", &config.allowed_methods);
    insert_list(headers, "Access-Control-Allow-Headers", &config.allowed_headers);
    insert_list(headers, "Access-Control-Expose-Headers", &config.exposed_headers);

    if config.allow_credentials {
        headers.insert(
            "Access-Control-Allow-Credentials",
            HeaderValue::from_static("true"),
        );
    }
    if config.max_age > 0 {
        if let Ok(value) = HeaderValue::from_str(&config.max_age.to_string()) {
            headers.insert("Access-Control-Max-Age", value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_origin_match() {
        let allowed = vec!["http://localhost:3000".to_string()];
        assert!(is_allowed_origin("http://localhost:3000", &allowed));
        assert!(!is_allowed_origin("http://evil.example", &allowed));
    }

    #[test]
    fn test_wildcard_suffix_match() {
        let allowed = vec!["*.example.com".to_string()];
        assert!(is_allowed_origin("app.example.com", &allowed));
        assert!(is_allowed_origin("deep.sub.example.com", &allowed));
        assert!(is_allowed_origin("example.com", &allowed));
        assert!(!is_allowed_origin("example.com.evil.io", &allowed));
        assert!(!is_allowed_origin("notexample.com", &allowed));
    }
}
