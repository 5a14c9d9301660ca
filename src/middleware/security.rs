//! Security response headers.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Response};
use axum::middleware::Next;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub content_security_policy: String,
    pub hsts_max_age: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    pub frame_options: String,
    pub content_type_nosniff: bool,
    pub xss_protection: String,
    pub referrer_policy: String,
}

impl SecurityConfig {
    pub fn default_config() -> Self {
        Self {
            content_security_policy: "default-src 'self'; script-src 'self'; \
                 style-src 'self' 'unsafe-inline'; img-src 'self' data: https:"
                .to_string(),
            hsts_max_age: 31_536_000,
            hsts_include_subdomains: true,
            hsts_preload: false,
            frame_options: "DENY".to_string(),
            content_type_nosniff: true,
            xss_protection: "1; mode=block".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
        }
    }

    pub fn production() -> Self {
        Self {
            content_security_policy: "default-src 'self'; script-src 'self'; \
                 style-src 'self'; img-src 'self'; connect-src 'self'; \
                 object-src 'none'; frame-src 'none';"
                .to_string(),
            hsts_max_age: 63_072_000,
            hsts_include_subdomains: true,
            hsts_preload: true,
            frame_options: "DENY".to_string(),
            content_type_nosniff: true,
            xss_protection: "1; mode=block".to_string(),
            referrer_policy: "no-referrer".to_string(),
        }
    }

    pub fn development() -> Self {
        Self {
            // HSTS off so plain HTTP keeps working locally.
            hsts_max_age: 0,
            hsts_include_subdomains: false,
            frame_options: "SAMEORIGIN".to_string(),
            content_security_policy:
                "default-src 'self' 'unsafe-inline' 'unsafe-eval'; img-src 'self' data: https: http:"
                    .to_string(),
            ..Self::default_config()
        }
    }

    pub fn hsts_header(&self) -> String {
        let mut value = format!("max-age={}", self.hsts_max_age);
        if self.hsts_include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.hsts_preload {
            value.push_str("; preload");
        }
        value
    }
}

pub async fn security_headers(
    config: Arc<SecurityConfig>,
    req: Request,
    next: Next,
) -> Response<Body> {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    let mut set = |name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    };

    if !config.content_security_policy.is_empty() {
        set(
            "content-security-policy",
            config.content_security_policy.clone(),
        );
    }
    if config.hsts_max_age > 0 {
        set("strict-transport-security", config.hsts_header());
    }
    if !config.frame_options.is_empty() {
        set("x-frame-options", config.frame_options.clone());
    }
    if config.content_type_nosniff {
        set("x-content-type-options", "nosniff".to_string());
    }
    if !config.xss_protection.is_empty() {
        set("x-xss-protection", config.xss_protection.clone());
    }
    if !config.referrer_policy.is_empty() {
        set("referrer-policy", config.referrer_policy.clone());
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsts_header_format() {
        let config = SecurityConfig::default_config();
        assert_eq!(config.hsts_header(), "max-age=31536000; includeSubDomains");

        let config = SecurityConfig::production();
        assert_eq!(
            config.hsts_header(),
            "max-age=63072000; includeSubDomains; preload"
        );
    }

    #[test]
    fn test_development_disables_hsts() {
        assert_eq!(SecurityConfig::development().hsts_max_age, 0);
    }
}
