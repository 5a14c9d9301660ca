//! Role-based access control.
//!
//! Permission sets derive from the three roles: admin is a superset of mod,
//! which is a superset of user plus moderator-specific grants. A protected
//! route declares one required permission and may additionally allow the
//! resource owner through an ownership predicate on the `{id}` path
//! parameter.

use crate::auth::Claims;
use crate::error::ApiError;
use crate::models::Role;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, Response};
use axum::middleware::Next;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    // User permissions
    ViewOwnProfile,
    UpdateOwnProfile,
    DeleteOwnProfile,
    ViewOwnBalance,
    MakeTransaction,

    // Moderator permissions
    ViewUserList,
    ViewUserDetails,
    ModerateUsers,
    ViewTransactions,

    // Admin permissions
    ViewAllUsers,
    ViewAnyUser,
    UpdateAnyUser,
    DeleteAnyUser,
    ViewAllBalances,
    ViewAnyBalance,
    ViewAllTransactions,
    SystemManagement,
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::ViewOwnProfile,
    Permission::UpdateOwnProfile,
    Permission::DeleteOwnProfile,
    Permission::ViewOwnBalance,
    Permission::MakeTransaction,
];

const MOD_PERMISSIONS: &[Permission] = &[
    Permission::ViewOwnProfile,
    Permission::UpdateOwnProfile,
    Permission::DeleteOwnProfile,
    Permission::ViewOwnBalance,
    Permission::MakeTransaction,
    Permission::ViewUserList,
    Permission::ViewUserDetails,
    Permission::ModerateUsers,
    Permission::ViewTransactions,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewOwnProfile,
    Permission::UpdateOwnProfile,
    Permission::DeleteOwnProfile,
    Permission::ViewOwnBalance,
    Permission::MakeTransaction,
    Permission::ViewUserList,
    Permission::ViewUserDetails,
    Permission::ModerateUsers,
    Permission::ViewTransactions,
    Permission::ViewAllUsers,
    Permission::ViewAnyUser,
    Permission::UpdateAnyUser,
    Permission::DeleteAnyUser,
    Permission::ViewAllBalances,
    Permission::ViewAnyBalance,
    Permission::ViewAllTransactions,
    Permission::SystemManagement,
];

pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::User => USER_PERMISSIONS,
        Role::Mod => MOD_PERMISSIONS,
        Role::Admin => ADMIN_PERMISSIONS,
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

fn claims_of(req: &Request) -> Result<&Claims, ApiError> {
    req.extensions().get::<Claims>().ok_or_else(|| {
        tracing::error!(
            path = req.uri().path(),
            "RBAC reached without authentication context"
        );
        ApiError::Auth("Authentication required".into())
    })
}

/// Numeric `{id}` following the `users` segment, if any.
fn path_user_id(path: &str) -> Option<i64> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for window in segments.windows(2) {
        if window[0] == "users" {
            if let Ok(id) = window[1].parse::<i64>() {
                return Some(id);
            }
        }
    }
    None
}

fn deny(claims: &Claims, permission: Permission, req: &Request) -> ApiError {
    tracing::warn!(
        user_id = claims.user_id,
        role = %claims.role,
        required_permission = ?permission,
        path = req.uri().path(),
        method = %req.method(),
        "RBAC: access denied"
    );
    ApiError::Forbidden("You do not have permission for this operation".into())
}

/// Require one permission; no ownership escape hatch.
pub async fn require(
    permission: Permission,
    req: Request,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    let claims = claims_of(&req)?;
    if !has_permission(claims.role, permission) {
        return Err(deny(claims, permission, &req));
    }
    Ok(next.run(req).await)
}

/// Grant when the `{id}` path parameter names the caller, or when the
/// permission is held.
pub async fn require_or_owner(
    permission: Permission,
    req: Request,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    let claims = claims_of(&req)?;

    if let Some(resource_id) = path_user_id(req.uri().path()) {
        if resource_id == claims.user_id {
            tracing::debug!(
                user_id = claims.user_id,
                path = req.uri().path(),
                "RBAC: access granted as resource owner"
            );
            return Ok(next.run(req).await);
        }
    }

    if !has_permission(claims.role, permission) {
        return Err(deny(claims, permission, &req));
    }
    Ok(next.run(req).await)
}

/// Method- and shape-aware dispatch for the `/users` subtree.
pub async fn user_management(req: Request, next: Next) -> Result<Response<Body>, ApiError> {
    let path = req.uri().path();
    let method = req.method().clone();
    let has_id = path_user_id(path).is_some();
    let is_profile = path.ends_with("/profile");

    match method {
        Method::GET if is_profile => require(Permission::ViewOwnProfile, req, next).await,
        Method::GET if has_id => require_or_owner(Permission::ViewAnyUser, req, next).await,
        Method::GET => require(Permission::ViewUserList, req, next).await,
        Method::PUT => require_or_owner(Permission::UpdateAnyUser, req, next).await,
        Method::DELETE => require_or_owner(Permission::DeleteAnyUser, req, next).await,
        _ => require(Permission::ViewOwnProfile, req, next).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_superset_of_mod_superset_of_user() {
        for p in USER_PERMISSIONS {
            assert!(MOD_PERMISSIONS.contains(p), "mod missing {p:?}");
            assert!(ADMIN_PERMISSIONS.contains(p), "admin missing {p:?}");
        }
        for p in MOD_PERMISSIONS {
            assert!(ADMIN_PERMISSIONS.contains(p), "admin missing {p:?}");
        }
    }

    #[test]
    fn test_role_grants() {
        assert!(has_permission(Role::User, Permission::MakeTransaction));
        assert!(!has_permission(Role::User, Permission::ViewUserList));
        assert!(has_permission(Role::Mod, Permission::ViewUserList));
        assert!(!has_permission(Role::Mod, Permission::SystemManagement));
        assert!(has_permission(Role::Admin, Permission::SystemManagement));
    }

    #[test]
    fn test_path_user_id_extraction() {
        assert_eq!(path_user_id("/api/v1/users/42"), Some(42));
        assert_eq!(path_user_id("/api/v1/admin/users/7/promote"), Some(7));
        assert_eq!(path_user_id("/api/v1/users/profile"), None);
        assert_eq!(path_user_id("/api/v1/transactions/9"), None);
    }
}
