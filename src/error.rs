//! Centralized error taxonomy and HTTP conversion.
//!
//! Services and repositories return these variants upward without any HTTP
//! formatting; the error-envelope middleware is the single point that turns
//! an error status into the wire envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::json;

/// Application-wide Result type for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

/// Application error kinds, each carrying its intended HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient balance. Current balance: {available:.2}")]
    InsufficientFunds { available: Decimal },

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Transaction queue is full, try again later")]
    QueueFull,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the wire envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Auth(_) => "auth",
            ApiError::Forbidden(_) => "authorization",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::InsufficientFunds { .. } => "insufficient_funds",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::QueueFull => "queue_full",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Message safe to show to clients. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Marker attached to error responses so the envelope middleware can
/// rebuild the body with request context without re-parsing it.
#[derive(Debug, Clone)]
pub struct ErrorTag {
    pub message: String,
    pub kind: &'static str,
    /// Set when the producer already wrote a complete envelope body that
    /// must not be rewritten (e.g. the rate limiter's detail payload).
    pub finalized: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.public_message();

        let tag = ErrorTag {
            message: message.clone(),
            kind: self.kind(),
            finalized: false,
        };

        // Minimal body; the envelope middleware adds request id, timestamp
        // and route details on the way out.
        let mut response = (
            status,
            Json(json!({
                "success": false,
                "error": message,
                "code": status.as_u16(),
            })),
        )
            .into_response();

        if let ApiError::RateLimited {
            retry_after_seconds,
        } = &self
        {
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response.extensions_mut().insert(tag);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::QueueFull.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::RateLimited {
                retry_after_seconds: 1
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_insufficient_funds_includes_balance() {
        let err = ApiError::InsufficientFunds {
            available: Decimal::from_str("10.50").unwrap(),
        };
        assert!(err.to_string().contains("10.50"));
        assert_eq!(err.kind(), "insufficient_funds");
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::Internal("connection pool exploded".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
