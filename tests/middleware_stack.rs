//! Router-level tests for the middleware chain. These drive the full
//! stack with a lazily-connected pool, so nothing here needs a running
//! database: every asserted behavior short-circuits before a query.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use paygate::auth::JwtKeys;
use paygate::config::Config;
use paygate::db::Database;
use paygate::gateway::build_router;
use paygate::gateway::state::AppState;
use paygate::middleware::metrics::{MetricsConfig, MetricsRegistry};
use paygate::middleware::ratelimit::{RateLimitConfig, RateLimiter};
use paygate::repository::{
    AuditRepository, BalanceRepository, TransactionRepository, UserRepository,
};
use paygate::services::{BalanceService, TransactionQueue, TransactionService, UserService};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        app_env: "development".to_string(),
        port: 8080,
        db_host: "localhost".to_string(),
        db_port: "5432".to_string(),
        db_user: "paygate".to_string(),
        db_pass: "password".to_string(),
        db_name: "paygate_test".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        log_level: "info".to_string(),
        log_dir: "./logs".to_string(),
        log_file: "test.log".to_string(),
        log_json: false,
    }
}

fn test_app() -> Router {
    let config = test_config();
    let db = Database::connect_lazy(&config.dsn()).expect("lazy pool");
    let pool = db.pool().clone();

    let jwt = Arc::new(JwtKeys::new(&config.jwt_secret));
    let users = Arc::new(UserService::new(
        UserRepository::new(pool.clone()),
        AuditRepository::new(pool.clone()),
        jwt.clone(),
    ));
    let balances = Arc::new(BalanceService::new(
        BalanceRepository::new(pool.clone()),
        pool.clone(),
    ));
    let transactions = Arc::new(TransactionService::new(
        TransactionRepository::new(pool.clone()),
        pool.clone(),
    ));
    let queue = Arc::new(TransactionQueue::new(0, transactions.clone(), 8));

    let state = Arc::new(AppState {
        config,
        db,
        users,
        balances,
        transactions,
        queue,
        jwt,
        metrics: Arc::new(MetricsRegistry::new(MetricsConfig::default())),
        rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
    });

    build_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body must be JSON")
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("X-Forwarded-For", "203.0.113.77")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app();
    let response = app.oneshot(get("/api/v1/nothing-here")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let request_id = response
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 404);
    assert_eq!(body["details"]["method"], "GET");
    assert_eq!(body["details"]["path"], "/api/v1/nothing-here");
    assert!(body["timestamp"].is_string());
    assert_eq!(body["request_id"].as_str(), request_id.as_deref());
}

#[tokio::test]
async fn test_wrong_verb_is_json_405() {
    let app = test_app();
    let response = app
        .oneshot(get("/api/v1/auth/register"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 405);
}

#[tokio::test]
async fn test_protected_route_requires_auth() {
    let app = test_app();
    let response = app
        .oneshot(get("/api/v1/balances/current"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Authorization header is required");
}

#[tokio::test]
async fn test_garbage_bearer_token_rejected() {
    let app = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/balances/current")
        .header("Authorization", "Bearer not.a.token")
        .header("X-Forwarded-For", "203.0.113.78")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_with_wrong_secret_rejected() {
    let app = test_app();
    let other_keys = JwtKeys::new("some-other-secret");
    let token = other_keys
        .sign(1, "a@b.io", paygate::models::Role::User)
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/balances/current")
        .header("Authorization", format!("Bearer {token}"))
        .header("X-Forwarded-For", "203.0.113.79")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sql_injection_in_query_rejected() {
    let app = test_app();
    let response = app
        .oneshot(get("/api/v1/auth/login?user=1%20OR%201%3D1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Security violation detected");
}

#[tokio::test]
async fn test_xss_in_query_rejected() {
    let app = test_app();
    let response = app
        .oneshot(get("/api/v1/auth/login?q=%3Cscript%3Ealert(1)%3C%2Fscript%3E"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_numeric_id_segment_rejected() {
    let app = test_app();
    let response = app.oneshot(get("/api/v1/transactions/abc")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("positive integer"));
}

#[tokio::test]
async fn test_register_validation_fails_before_database() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/register")
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "203.0.113.80")
        .body(Body::from(
            r#"{"name":"Jane","email":"jane@example.com","password":"weak","confirm_password":"weak"}"#,
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("at least 6"));
}

#[tokio::test]
async fn test_unsupported_content_type_rejected() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/register")
        .header("Content-Type", "text/plain")
        .header("X-Forwarded-For", "203.0.113.81")
        .body(Body::from("hello"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let app = test_app();
    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.contains_key("x-frame-options"));
    assert!(headers.contains_key("x-xss-protection"));
    assert!(headers.contains_key("referrer-policy"));
    assert!(headers.contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_rate_limit_headers_and_burst_denial() {
    let app = test_app();
    let ip = "198.51.100.200";

    for i in 0..10 {
        let request = Request::builder()
            .method("GET")
            .uri("/metrics")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "request {i} within burst should pass"
        );
        assert!(response.headers().contains_key("X-RateLimit-Limit"));
        assert!(response.headers().contains_key("X-RateLimit-Remaining"));
        assert!(response.headers().contains_key("X-RateLimit-Reset"));
    }

    let request = Request::builder()
        .method("GET")
        .uri("/metrics")
        .header("X-Forwarded-For", ip)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok()),
        Some("0")
    );
    let retry_after: u64 = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header");
    assert!(retry_after > 0);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 429);
    assert_eq!(body["rate_limit"]["remaining"], 0);
}

#[tokio::test]
async fn test_cors_preflight_returns_204() {
    let app = test_app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/auth/login")
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .header("X-Forwarded-For", "203.0.113.82")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("Access-Control-Allow-Origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    assert!(response
        .headers()
        .contains_key("Access-Control-Allow-Methods"));
}

#[tokio::test]
async fn test_panic_route_recovers_to_500_envelope() {
    let app = test_app();
    let response = app.oneshot(get("/panic")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 500);
    assert_eq!(body["error"], "Internal server error");
    // Development profile surfaces the panic payload.
    assert!(body["stack"]
        .as_str()
        .unwrap()
        .contains("error middleware probe"));
}

#[tokio::test]
async fn test_error_probe_routes_map_statuses() {
    let app = test_app();
    for (path, status) in [
        ("/error/400", StatusCode::BAD_REQUEST),
        ("/error/401", StatusCode::UNAUTHORIZED),
        ("/error/403", StatusCode::FORBIDDEN),
        ("/error/500", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let response = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), status, "status for {path}");
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], status.as_u16());
    }
}

#[tokio::test]
async fn test_responses_carry_request_id_header() {
    let app = test_app();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    let request_id = response
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .expect("X-Request-ID header");
    assert_eq!(request_id.len(), 36);
}

#[tokio::test]
async fn test_metrics_snapshot_shape() {
    let app = test_app();
    let _ = app.clone().oneshot(get("/api/v1/na")).await.unwrap();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["total_requests"].as_u64().unwrap() >= 1);
    assert!(body["status_code_counts"].is_object());
    assert!(body["endpoint_counts"].is_object());
    assert!(body["response_time_summary"].is_object());
}
