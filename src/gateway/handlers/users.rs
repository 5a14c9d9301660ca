//! User and admin endpoints.

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, Pagination, UserListData};
use crate::models::{Role, UpdateUserRequest, User};
use crate::services::ClientMeta;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use std::sync::Arc;

fn client_of(client: Option<Extension<ClientMeta>>) -> ClientMeta {
    client.map(|Extension(c)| c).unwrap_or_default()
}

pub async fn get_all_users(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<ApiResponse<UserListData>>> {
    let limit = page.limit_or_default();
    let offset = page.offset_or_default();
    let (users, total_count) = state.users.get_all_users(limit, offset).await?;

    Ok(Json(ApiResponse::ok(
        UserListData {
            users,
            total_count,
            limit,
            offset,
        },
        "Users listed successfully",
    )))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state.users.get_user_by_id(claims.user_id).await?;
    Ok(Json(ApiResponse::ok(user, "Profile fetched successfully")))
}

pub async fn get_user_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state.users.get_user_by_id(id).await?;
    Ok(Json(ApiResponse::ok(user, "User fetched successfully")))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    client: Option<Extension<ClientMeta>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    // Role changes are an admin-only concern even when the owner edits
    // their own profile.
    if req.role.is_some() && claims.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Only administrators can change roles".into(),
        ));
    }

    let client = client_of(client);
    let user = state
        .users
        .update_user(id, req, claims.user_id, &client)
        .await?;

    Ok(Json(ApiResponse::ok(user, "User updated successfully")))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    client: Option<Extension<ClientMeta>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let client = client_of(client);
    state.users.delete_user(id, claims.user_id, &client).await?;

    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "id": id }),
        "User deleted successfully",
    )))
}

pub async fn promote_to_mod(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    client: Option<Extension<ClientMeta>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let client = client_of(client);
    let user = state
        .users
        .promote_to_mod(claims.user_id, id, &client)
        .await?;

    Ok(Json(ApiResponse::ok(user, "User promoted to moderator")))
}

/// Audit trail for one user. Admin only.
pub async fn user_audit_trail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<ApiResponse<Vec<crate::models::AuditLog>>>> {
    let entries = state
        .users
        .audit_trail(id, page.limit_or_default(), page.offset_or_default())
        .await?;

    Ok(Json(ApiResponse::ok(
        entries,
        "Audit trail fetched successfully",
    )))
}

pub async fn demote_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    client: Option<Extension<ClientMeta>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let client = client_of(client);
    let user = state.users.demote(claims.user_id, id, &client).await?;

    Ok(Json(ApiResponse::ok(user, "User demoted")))
}
