//! Bearer-token authentication.

use crate::auth::JwtKeys;
use crate::error::ApiError;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, Response};
use axum::middleware::Next;
use std::sync::Arc;

/// Validate the `Authorization: Bearer <token>` header and inject the
/// verified claims into the request extensions.
pub async fn authenticate(
    keys: Arc<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!(path = req.uri().path(), "missing Authorization header");
            ApiError::Auth("Authorization header is required".into())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!(
            path = req.uri().path(),
            auth_header = %mask_auth_header(auth_header),
            "invalid Authorization format"
        );
        ApiError::Auth("Authorization format must be 'Bearer <token>'".into())
    })?;

    let claims = keys.verify(token).map_err(|err| {
        tracing::warn!(path = req.uri().path(), error = %err, "token validation failed");
        ApiError::Auth("Invalid token".into())
    })?;

    tracing::debug!(
        user_id = claims.user_id,
        role = %claims.role,
        path = req.uri().path(),
        "authentication successful"
    );

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Mask the token portion before it reaches a log line.
fn mask_auth_header(header: &str) -> String {
    if header.len() <= 10 {
        "Bearer ***".to_string()
    } else {
        format!("{}***", &header[..10])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_auth_header() {
        assert_eq!(mask_auth_header("Bearer x"), "Bearer ***");
        assert_eq!(
            mask_auth_header("Bearer abcdefghijklmnop"),
            "Bearer abc***"
        );
    }
}
