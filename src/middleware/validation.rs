//! Input validation: content checks, path-parameter typing, and a
//! SQL-injection / XSS denylist over query parameters, form values, and
//! selected headers.

use super::client_ip;
use crate::error::ApiError;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{Method, Response};
use axum::middleware::Next;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Maximum size of a single parameter fed to the pattern scan.
    pub max_param_size: usize,
    pub allowed_methods: Vec<&'static str>,
    pub allowed_content_types: Vec<&'static str>,
    pub sql_injection_check: bool,
    pub xss_check: bool,
    pub require_non_empty_json: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
            max_param_size: 2048,
            allowed_methods: vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH", "HEAD"],
            allowed_content_types: vec!["application/json", "application/x-www-form-urlencoded"],
            sql_injection_check: true,
            xss_check: true,
            require_non_empty_json: false,
        }
    }
}

impl ValidationConfig {
    /// Tight limits for production.
    pub fn strict() -> Self {
        Self {
            max_body_size: 512 * 1024,
            max_param_size: 1024,
            require_non_empty_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            require_non_empty_json: true,
            ..Default::default()
        }
    }
}

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(\bor\b|\band\b)\s+\d+\s*=\s*\d+",
        r"(?i)union\s+select",
        r"(?i)drop\s+table",
        r"(?i)delete\s+from",
        r"(?i)insert\s+into",
        r"(?i)update\s+set",
        r"(?i)information_schema",
        r"(?i);--",
        r"(?i)waitfor\s+delay",
        r"(?i)-{2,}",
        r"(?i)/\*.*?\*/",
        r"(?i)\bexec\b|\bexecute\b",
        r"(?i)\bsp_\w+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static XSS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<script[^>]*>.*?</script>",
        r"(?i)javascript:",
        r"(?i)on\w+\s*=",
        r"(?i)<iframe\b",
        r"(?i)<object\b",
        r"(?i)<embed\b",
        r"(?i)srcdoc\s*=",
        r#"(?i)src\s*=\s*["']\s*javascript:"#,
        r"(?i)eval\s*\(",
        r"(?i)expression\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Path segments that legitimately follow a collection name.
const ROUTE_WORDS: &[&str] = &[
    "profile",
    "credit",
    "debit",
    "transfer",
    "history",
    "stats",
    "current",
    "historical",
    "at-time",
    "promote",
    "demote",
];

fn matches_any(input: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(input))
}

fn scan_value(value: &str, config: &ValidationConfig) -> Result<(), &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > config.max_param_size {
        return Err("parameter too long");
    }
    if config.sql_injection_check && matches_any(value, &SQL_PATTERNS) {
        return Err("malicious SQL pattern");
    }
    if config.xss_check && matches_any(value, &XSS_PATTERNS) {
        return Err("malicious XSS pattern");
    }
    Ok(())
}

/// Id segments in known collections must be positive integers.
fn validate_path(path: &str) -> Result<(), String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for window in segments.windows(2) {
        let (parent, child) = (window[0], window[1]);
        if (parent == "users" || parent == "transactions") && !ROUTE_WORDS.contains(&child) {
            match child.parse::<i64>() {
                Ok(id) if id > 0 => {}
                _ => {
                    return Err(format!(
                        "Path parameter '{child}' must be a positive integer"
                    ))
                }
            }
        }
    }
    Ok(())
}

/// Standalone validators for typed path parameters.
pub mod rules {
    use chrono::NaiveDate;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("static pattern")
    });
    static ALPHANUMERIC_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("static pattern"));
    static SLUG_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[a-z0-9\-]+$").expect("static pattern"));
    static HEX_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[0-9a-fA-F]+$").expect("static pattern"));
    static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static pattern")
    });

    pub fn positive_integer(value: &str) -> bool {
        matches!(value.parse::<i64>(), Ok(v) if v > 0)
    }

    pub fn uuid(value: &str) -> bool {
        UUID_PATTERN.is_match(value)
    }

    pub fn alphanumeric(value: &str) -> bool {
        ALPHANUMERIC_PATTERN.is_match(value)
    }

    pub fn slug(value: &str) -> bool {
        SLUG_PATTERN.is_match(value)
    }

    pub fn hex(value: &str) -> bool {
        HEX_PATTERN.is_match(value)
    }

    pub fn date(value: &str) -> bool {
        const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];
        FORMATS
            .iter()
            .any(|f| NaiveDate::parse_from_str(value, f).is_ok())
    }

    pub fn email(value: &str) -> bool {
        EMAIL_PATTERN.is_match(value)
    }
}

pub async fn validate_request(
    config: Arc<ValidationConfig>,
    req: Request,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    // CORS preflight bypasses validation.
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    if !config.allowed_methods.contains(&req.method().as_str()) {
        return Err(ApiError::Validation(format!(
            "HTTP method '{}' is not supported",
            req.method()
        )));
    }

    validate_path(req.uri().path()).map_err(ApiError::Validation)?;

    // Query parameter scan, percent-decoded.
    if let Some(query) = req.uri().query() {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            for part in [key.as_ref(), value.as_ref()] {
                if let Err(reason) = scan_value(part, &config) {
                    tracing::warn!(
                        client_ip = %client_ip(&req),
                        path = req.uri().path(),
                        reason,
                        "security threat detected in query"
                    );
                    return Err(ApiError::Validation("Security violation detected".into()));
                }
            }
        }
    }

    // Header scan (XSS vectors show up in Referer and User-Agent).
    if config.xss_check {
        for header in ["Referer", "User-Agent"] {
            if let Some(value) = req.headers().get(header).and_then(|v| v.to_str().ok()) {
                let value = value.trim();
                if !value.is_empty()
                    && value.len() <= config.max_param_size
                    && matches_any(value, &XSS_PATTERNS)
                {
                    tracing::warn!(
                        client_ip = %client_ip(&req),
                        header,
                        "security threat detected in header"
                    );
                    return Err(ApiError::Validation("Security violation detected".into()));
                }
            }
        }
    }

    let is_body_method = matches!(req.method(), &Method::POST | &Method::PUT | &Method::PATCH);
    if !is_body_method {
        return Ok(next.run(req).await);
    }

    // Content-Type allowlist.
    let content_type = req
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if content_type.is_empty() {
        return Err(ApiError::Validation("Content-Type header is required".into()));
    }
    if !config
        .allowed_content_types
        .iter()
        .any(|allowed| content_type.starts_with(allowed))
    {
        return Err(ApiError::Validation(format!(
            "Unsupported Content-Type: {content_type}"
        )));
    }

    // Declared length check; chunked bodies are allowed and bounded by the
    // buffered read below.
    if let Some(length) = req
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if length > config.max_body_size {
            return Err(ApiError::Validation(format!(
                "Request body too large. Maximum size: {} bytes",
                config.max_body_size
            )));
        }
    }

    // Buffer the body for inspection, then hand it back downstream.
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, config.max_body_size)
        .await
        .map_err(|_| {
            ApiError::Validation(format!(
                "Request body too large. Maximum size: {} bytes",
                config.max_body_size
            ))
        })?;

    if content_type.starts_with("application/json") {
        if bytes.is_empty() {
            if config.require_non_empty_json {
                return Err(ApiError::Validation("JSON body must not be empty".into()));
            }
        } else if serde_json::from_slice::<serde_json::Value>(&bytes).is_err() {
            return Err(ApiError::Validation("Invalid JSON format".into()));
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        for (key, value) in form_urlencoded::parse(&bytes) {
            for part in [key.as_ref(), value.as_ref()] {
                if let Err(reason) = scan_value(part, &config) {
                    tracing::warn!(reason, "security threat detected in form data");
                    return Err(ApiError::Validation("Security violation detected".into()));
                }
            }
        }
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ValidationConfig {
        ValidationConfig::default()
    }

    #[test]
    fn test_sql_injection_patterns() {
        for payload in [
            "1 OR 1=1",
            "UNION SELECT password FROM users",
            "x'; DROP TABLE users; --",
            "delete from balances",
            "information_schema.tables",
        ] {
            assert!(
                scan_value(payload, &config()).is_err(),
                "should flag: {payload}"
            );
        }
    }

    #[test]
    fn test_xss_patterns() {
        for payload in [
            "<script>alert(1)</script>",
            "javascript:alert(1)",
            "<iframe src=x>",
            "onerror=alert(1)",
            "eval(document.cookie)",
        ] {
            assert!(
                scan_value(payload, &config()).is_err(),
                "should flag: {payload}"
            );
        }
    }

    #[test]
    fn test_benign_values_pass() {
        for payload in ["hello world", "42", "a@b.io", "2025-01-01T00:00:00Z", ""] {
            assert!(scan_value(payload, &config()).is_ok(), "should pass: {payload}");
        }
    }

    #[test]
    fn test_oversized_parameter_rejected() {
        let long = "a".repeat(4096);
        assert!(scan_value(&long, &config()).is_err());
    }

    #[test]
    fn test_path_id_typing() {
        assert!(validate_path("/api/v1/users/42").is_ok());
        assert!(validate_path("/api/v1/users/profile").is_ok());
        assert!(validate_path("/api/v1/transactions/history").is_ok());
        assert!(validate_path("/api/v1/transactions/17").is_ok());
        assert!(validate_path("/api/v1/admin/users/9/promote").is_ok());

        assert!(validate_path("/api/v1/users/abc").is_err());
        assert!(validate_path("/api/v1/users/-1").is_err());
        assert!(validate_path("/api/v1/transactions/0").is_err());
    }

    #[test]
    fn test_rule_validators() {
        assert!(rules::positive_integer("5"));
        assert!(!rules::positive_integer("0"));
        assert!(!rules::positive_integer("five"));

        assert!(rules::uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!rules::uuid("not-a-uuid"));

        assert!(rules::slug("my-page-2"));
        assert!(!rules::slug("My Page"));

        assert!(rules::hex("deadBEEF09"));
        assert!(!rules::hex("xyz"));

        assert!(rules::alphanumeric("abc123"));
        assert!(!rules::alphanumeric("a b"));

        assert!(rules::date("2025-08-01"));
        assert!(rules::date("01/08/2025"));
        assert!(!rules::date("2025-13-01"));

        assert!(rules::email("a@b.io"));
        assert!(!rules::email("nope"));
    }
}
