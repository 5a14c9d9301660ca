//! Request logging with per-request correlation ids.

use super::client_ip;
use crate::services::ClientMeta;
use axum::body::Body;
use axum::extract::Request;
use axum::http::Response;
use axum::middleware::Next;
use std::time::Instant;
use uuid::Uuid;

const SKIP_PATHS: &[&str] = &["/health", "/favicon.ico"];

/// Assign a request id, stash client metadata for downstream consumers,
/// and log request start/completion. The log level escalates with the
/// response status class.
pub async fn request_logger(mut req: Request, next: Next) -> Response<Body> {
    let path = req.uri().path().to_string();
    if SKIP_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let query = req.uri().query().map(|q| q.to_string());
    let ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let request_size = req
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);

    req.extensions_mut().insert(ClientMeta {
        ip: ip.clone(),
        user_agent: user_agent.clone(),
    });

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        query = query.as_deref().unwrap_or(""),
        client_ip = %ip,
        user_agent = %user_agent,
        request_size,
        "request started"
    );

    let start = Instant::now();
    let mut response = next.run(req).await;
    let duration = start.elapsed();

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", value);
    }

    let status = response.status().as_u16();
    let response_size = response
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let duration_ms = duration.as_secs_f64() * 1000.0;

    match status {
        500.. => tracing::error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            client_ip = %ip,
            status_code = status,
            response_size,
            duration_ms,
            "request completed"
        ),
        400..=499 => tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            client_ip = %ip,
            status_code = status,
            response_size,
            duration_ms,
            "request completed"
        ),
        _ => tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            client_ip = %ip,
            status_code = status,
            response_size,
            duration_ms,
            "request completed"
        ),
    }

    response
}
