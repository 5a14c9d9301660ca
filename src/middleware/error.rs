//! Error envelope middleware and panic guard.
//!
//! This is the single point where in-process failures become wire
//! responses. Handlers and inner middleware return `ApiError`; anything
//! that unwinds is caught by the panic layer just inside. Either way, the
//! response leaving this layer carries the standard envelope:
//! `{success:false, error, code, timestamp, request_id, details, stack?}`.

use crate::error::ErrorTag;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

/// Error-presentation settings.
#[derive(Debug, Clone)]
pub struct ErrorConfig {
    /// Include the panic payload in the response body. Development only.
    pub show_stack_trace: bool,
    pub custom_messages: HashMap<u16, &'static str>,
    pub max_error_length: usize,
}

impl ErrorConfig {
    pub fn default_config() -> Self {
        let mut custom_messages = HashMap::new();
        custom_messages.insert(400, "Invalid request. Please check your parameters.");
        custom_messages.insert(401, "Authentication required. Please sign in.");
        custom_messages.insert(403, "You do not have permission for this operation.");
        custom_messages.insert(404, "The requested resource was not found.");
        custom_messages.insert(405, "HTTP method not supported for this endpoint.");
        custom_messages.insert(409, "Conflict. This operation cannot be completed right now.");
        custom_messages.insert(415, "Unsupported media type.");
        custom_messages.insert(422, "Request body could not be processed.");
        custom_messages.insert(429, "Too many requests. Please try again later.");
        custom_messages.insert(500, "Server error. Our team has been notified.");
        custom_messages.insert(503, "Service temporarily unavailable. Please retry later.");

        Self {
            show_stack_trace: false,
            custom_messages,
            max_error_length: 500,
        }
    }

    pub fn development() -> Self {
        let mut config = Self::default_config();
        config.show_stack_trace = true;
        config.max_error_length = 2000;
        config
    }

    pub fn production() -> Self {
        let mut config = Self::default_config();
        config.show_stack_trace = false;
        config.max_error_length = 200;
        config
    }

    fn message_for(&self, status: StatusCode) -> String {
        self.custom_messages
            .get(&status.as_u16())
            .map(|m| m.to_string())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            })
    }
}

/// Panic payload captured by the panic guard, surfaced as `stack` in
/// development.
#[derive(Debug, Clone)]
pub struct PanicDetail(pub String);

/// Rewrite error-status responses into the standard envelope.
pub async fn error_envelope(config: Arc<ErrorConfig>, req: Request, next: Next) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();

    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let tag = response.extensions().get::<ErrorTag>().cloned();
    if let Some(tag) = &tag {
        // Producers like the rate limiter emit a richer body on purpose.
        if tag.finalized {
            return response;
        }
    }

    let panic_detail = response.extensions().get::<PanicDetail>().cloned();

    let message = match &tag {
        Some(tag) => truncate(&tag.message, config.max_error_length),
        None => config.message_for(status),
    };

    let (mut parts, _) = response.into_parts();
    let request_id = parts
        .headers
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let mut envelope = json!({
        "success": false,
        "error": message,
        "code": status.as_u16(),
        "timestamp": Utc::now().to_rfc3339(),
        "request_id": request_id,
        "details": {
            "method": method.as_str(),
            "path": path,
        },
    });

    if config.show_stack_trace {
        if let Some(PanicDetail(stack)) = panic_detail {
            envelope["stack"] = json!(stack);
        }
    }

    tracing::warn!(
        status = status.as_u16(),
        method = %method,
        path = %path,
        request_id = %envelope["request_id"],
        "request failed"
    );

    let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{\"success\":false}".to_vec());
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, "application/json".parse().expect("static header"));

    Response::from_parts(parts, Body::from(body))
}

/// Panic guard layer. Sits immediately inside the envelope middleware so a
/// recovered panic still gets the standard envelope treatment.
pub fn panic_guard() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response<Body>> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response<Body>)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());

    tracing::error!(panic = %detail, "handler panicked");

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({
            "success": false,
            "error": "Internal server error",
            "code": 500,
        })),
    )
        .into_response();

    response.extensions_mut().insert(ErrorTag {
        message: "Internal server error".to_string(),
        kind: "internal",
        finalized: false,
    });
    response.extensions_mut().insert(PanicDetail(detail));
    response
}

fn truncate(message: &str, max_length: usize) -> String {
    if message.len() <= max_length {
        message.to_string()
    } else {
        let mut end = max_length;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &message[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messages_cover_common_statuses() {
        let config = ErrorConfig::default_config();
        for status in [400, 401, 403, 404, 405, 429, 500, 503] {
            assert!(
                config.custom_messages.contains_key(&status),
                "missing message for {status}"
            );
        }
    }

    #[test]
    fn test_message_for_unmapped_status_uses_reason() {
        let config = ErrorConfig::default_config();
        assert_eq!(
            config.message_for(StatusCode::IM_A_TEAPOT),
            "I'm a teapot".to_string()
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcde...");
        // Multibyte input must not split a character.
        let s = "ééééé";
        let t = truncate(s, 3);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn test_profiles() {
        assert!(ErrorConfig::development().show_stack_trace);
        assert!(!ErrorConfig::production().show_stack_trace);
    }
}
