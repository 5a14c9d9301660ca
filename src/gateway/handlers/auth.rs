//! Authentication endpoints: register, login, token refresh.

use crate::error::{ApiError, ApiResult};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, RefreshData};
use crate::models::{CreateUserRequest, LoginRequest, LoginResponse, User};
use crate::services::ClientMeta;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub token: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    client: Option<Extension<ClientMeta>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<User>>)> {
    let client = client.map(|Extension(c)| c).unwrap_or_default();
    let user = state.users.register(req, &client).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(user, "User registered successfully")),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    let response = state.users.login(req).await?;
    Ok(Json(ApiResponse::ok(response, "Login successful")))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<ApiResponse<RefreshData>>> {
    if req.token.is_empty() {
        return Err(ApiError::Validation("Token must not be empty".into()));
    }

    let (token, expires_in) = state.jwt.refresh(&req.token)?;

    Ok(Json(ApiResponse::ok(
        RefreshData { token, expires_in },
        "Token refreshed successfully",
    )))
}
