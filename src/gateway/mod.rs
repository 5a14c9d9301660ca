//! Router assembly: the full middleware chain in order, the versioned API
//! surface, and JSON 404/405 fallbacks.

pub mod handlers;
pub mod state;
pub mod types;

use crate::error::ApiError;
use crate::middleware::rbac::Permission;
use crate::middleware::{auth as auth_mw, cors, error, metrics, ratelimit, rbac, request_log, security, validation};
use crate::models::CreateUserRequest;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{Json, Router};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Upper bound on in-handler processing time per request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the application router with the complete middleware chain.
///
/// Chain order, outermost first: error envelope → panic guard →
/// validation → metrics → CORS → request logger → security headers →
/// rate limiter, then per-route authentication and RBAC.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let is_development = app_state.config.is_development();

    let error_config = Arc::new(if is_development {
        error::ErrorConfig::development()
    } else {
        error::ErrorConfig::production()
    });
    let validation_config = Arc::new(if is_development {
        validation::ValidationConfig::development()
    } else {
        validation::ValidationConfig::strict()
    });
    let security_config = Arc::new(if is_development {
        security::SecurityConfig::development()
    } else {
        security::SecurityConfig::production()
    });
    let cors_config = Arc::new(cors::CorsConfig::default_config());

    // Public authentication routes.
    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh));

    // Protected subtrees, each with its RBAC discipline.
    let user_routes = Router::new()
        .route("/users", get(handlers::users::get_all_users))
        .route("/users/profile", get(handlers::users::get_profile))
        .route(
            "/users/{id}",
            get(handlers::users::get_user_by_id)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route_layer(from_fn(rbac::user_management));

    let admin_routes = Router::new()
        .route(
            "/admin/users/{id}/promote",
            post(handlers::users::promote_to_mod),
        )
        .route(
            "/admin/users/{id}/demote",
            post(handlers::users::demote_user),
        )
        .route(
            "/admin/users/{id}/audit",
            get(handlers::users::user_audit_trail),
        )
        .route(
            "/admin/transactions",
            get(handlers::transactions::list_by_status),
        )
        .route_layer(from_fn(|req, next| {
            rbac::require(Permission::SystemManagement, req, next)
        }));

    let transaction_routes = Router::new()
        .route("/transactions/credit", post(handlers::transactions::credit))
        .route("/transactions/debit", post(handlers::transactions::debit))
        .route(
            "/transactions/transfer",
            post(handlers::transactions::transfer),
        )
        .route(
            "/transactions/history",
            get(handlers::transactions::get_history),
        )
        .route("/transactions/stats", get(handlers::transactions::get_stats))
        .route(
            "/transactions/{id}",
            get(handlers::transactions::get_transaction_by_id),
        )
        .route_layer(from_fn(|req, next| {
            rbac::require(Permission::MakeTransaction, req, next)
        }));

    let balance_routes = Router::new()
        .route(
            "/balances/current",
            get(handlers::balances::get_current_balance),
        )
        .route(
            "/balances/historical",
            get(handlers::balances::get_balance_history),
        )
        .route(
            "/balances/at-time",
            get(handlers::balances::get_balance_at_time),
        )
        .route_layer(from_fn(|req, next| {
            rbac::require(Permission::ViewOwnBalance, req, next)
        }));

    let jwt = app_state.jwt.clone();
    let protected = user_routes
        .merge(admin_routes)
        .merge(transaction_routes)
        .merge(balance_routes)
        .route_layer(from_fn(move |req, next| {
            auth_mw::authenticate(jwt.clone(), req, next)
        }));

    let api = auth_routes.merge(protected);

    let mut router = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api/v1", api);

    if is_development {
        router = router.merge(development_routes());
    }

    let limiter = app_state.rate_limiter.clone();
    let registry = app_state.metrics.clone();

    router
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        // Innermost layer first; each `.layer` wraps everything before it.
        .layer(from_fn(move |req, next| {
            ratelimit::rate_limit(limiter.clone(), req, next)
        }))
        .layer(from_fn({
            let config = security_config.clone();
            move |req, next| security::security_headers(config.clone(), req, next)
        }))
        .layer(from_fn(request_log::request_logger))
        .layer(from_fn({
            let config = cors_config.clone();
            move |req, next| cors::cors(config.clone(), req, next)
        }))
        .layer(from_fn(move |req, next| {
            metrics::track_metrics(registry.clone(), req, next)
        }))
        .layer(from_fn({
            let config = validation_config.clone();
            move |req, next| validation::validate_request(config.clone(), req, next)
        }))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(error::panic_guard())
        .layer(from_fn(move |req, next| {
            error::error_envelope(error_config.clone(), req, next)
        }))
        .with_state(app_state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found. Check the API documentation.".into())
}

async fn method_not_allowed() -> StatusCode {
    // The envelope middleware supplies the JSON body for bare statuses.
    StatusCode::METHOD_NOT_ALLOWED
}

/// Probe endpoints and the admin bootstrap route. Development only.
fn development_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/panic", get(panic_probe))
        .route(
            "/error/400",
            get(|| async { ApiError::Validation("Bad request probe".into()) }),
        )
        .route(
            "/error/401",
            get(|| async { ApiError::Auth("Unauthorized probe".into()) }),
        )
        .route(
            "/error/403",
            get(|| async { ApiError::Forbidden("Forbidden probe".into()) }),
        )
        .route(
            "/error/500",
            get(|| async { ApiError::Internal("Internal error probe".into()) }),
        )
        .route("/dev/create-admin", post(create_admin))
}

async fn panic_probe() -> StatusCode {
    panic!("test panic: error middleware probe")
}

async fn create_admin(
    State(app_state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<types::ApiResponse<crate::models::User>>), ApiError> {
    let request = CreateUserRequest {
        name: "System Admin".to_string(),
        email: "admin@system.local".to_string(),
        password: "Admin123!".to_string(),
        confirm_password: "Admin123!".to_string(),
        role: Some("admin".to_string()),
    };

    let admin = app_state.users.create_admin(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(types::ApiResponse::ok(admin, "Admin user created")),
    ))
}
