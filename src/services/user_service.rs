//! User lifecycle: registration, login, profile updates, role transitions.

use crate::auth::{hash_password, verify_password, JwtKeys};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuditEntry, CreateUserRequest, LoginRequest, LoginResponse, Role, UpdateUserRequest, User,
};
use crate::repository::users::UpdateUserFields;
use crate::repository::{clamp_pagination, AuditRepository, UserRepository};
use serde_json::json;
use std::sync::Arc;

/// Request metadata recorded into the audit trail.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

pub struct UserService {
    users: UserRepository,
    audit: AuditRepository,
    jwt: Arc<JwtKeys>,
}

fn user_snapshot(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
    })
}

impl UserService {
    pub fn new(users: UserRepository, audit: AuditRepository, jwt: Arc<JwtKeys>) -> Self {
        Self { users, audit, jwt }
    }

    /// Register a new account. Privileged roles cannot be self-assigned.
    pub async fn register(
        &self,
        mut req: CreateUserRequest,
        client: &ClientMeta,
    ) -> ApiResult<User> {
        req.validate()?;

        if let Some(user) = self.users.get_by_email(&req.email).await? {
            tracing::debug!(user_id = user.id, "registration with existing email");
            return Err(ApiError::Validation("Email is already in use".into()));
        }

        match req.role.as_deref() {
            Some("admin") | Some("mod") => {
                return Err(ApiError::Validation(
                    "Admin and moderator accounts can only be created by a system administrator"
                        .into(),
                ));
            }
            _ => {}
        }

        let password_hash = hash_password(&req.password)?;
        let user = self
            .users
            .create(&req.name, &req.email, &password_hash, Role::User)
            .await
            .map_err(|err| match err {
                crate::repository::RepoError::Integrity(_) => {
                    ApiError::Validation("Email is already in use".into())
                }
                other => other.into(),
            })?;

        self.record_audit(
            AuditEntry::user_action(user.id, "register", Some(user.id))
                .with_new(user_snapshot(&user))
                .with_client(client.ip.clone(), client.user_agent.clone()),
        )
        .await;

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Create an admin account. Reachable only from trusted bootstrap paths.
    pub async fn create_admin(&self, mut req: CreateUserRequest) -> ApiResult<User> {
        req.role = Some("admin".to_string());
        req.validate()?;

        if self.users.get_by_email(&req.email).await?.is_some() {
            return Err(ApiError::Validation("Email is already in use".into()));
        }

        let password_hash = hash_password(&req.password)?;
        let user = self
            .users
            .create(&req.name, &req.email, &password_hash, Role::Admin)
            .await?;

        tracing::info!(user_id = user.id, "admin user created");
        Ok(user)
    }

    /// Authenticate and issue a bearer token. Failures are deliberately
    /// indistinguishable between unknown email and wrong password.
    pub async fn login(&self, mut req: LoginRequest) -> ApiResult<LoginResponse> {
        req.validate()?;

        let user = self
            .users
            .get_by_email(&req.email)
            .await?
            .ok_or_else(|| ApiError::Auth("Invalid email or password".into()))?;

        if !verify_password(&req.password, &user.password_hash) {
            return Err(ApiError::Auth("Invalid email or password".into()));
        }

        let token = self.jwt.sign(user.id, &user.email, user.role)?;
        tracing::info!(user_id = user.id, "user logged in");

        Ok(LoginResponse { user, token })
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> ApiResult<User> {
        self.users
            .get_by_id(user_id)
            .await
            .map_err(|_| ApiError::NotFound("User not found".into()))
    }

    /// Partial profile update. Email uniqueness is re-checked against live
    /// users other than the target.
    pub async fn update_user(
        &self,
        user_id: i64,
        mut req: UpdateUserRequest,
        actor: i64,
        client: &ClientMeta,
    ) -> ApiResult<User> {
        req.validate()?;

        if let Some(email) = &req.email {
            if let Some(existing) = self.users.get_by_email(email).await? {
                if existing.id != user_id {
                    return Err(ApiError::Conflict(
                        "Email is already in use by another user".into(),
                    ));
                }
            }
        }

        let before = self.get_user_by_id(user_id).await?;

        let fields = UpdateUserFields {
            name: req.name,
            email: req.email,
            password_hash: match &req.password {
                Some(password) => Some(hash_password(password)?),
                None => None,
            },
            role: match &req.role {
                Some(role) => Role::from_str(role),
                None => None,
            },
        };

        let updated = self
            .users
            .update(user_id, fields)
            .await
            .map_err(|err| match err {
                crate::repository::RepoError::NotFound => {
                    ApiError::NotFound("User not found".into())
                }
                other => other.into(),
            })?;

        self.record_audit(
            AuditEntry::user_action(user_id, "update", Some(actor))
                .with_old(user_snapshot(&before))
                .with_new(user_snapshot(&updated))
                .with_client(client.ip.clone(), client.user_agent.clone()),
        )
        .await;

        Ok(updated)
    }

    /// Soft-delete: the account disappears from every query but the row
    /// survives.
    pub async fn delete_user(&self, user_id: i64, actor: i64, client: &ClientMeta) -> ApiResult<()> {
        let before = self.get_user_by_id(user_id).await?;

        self.users.delete(user_id).await.map_err(|err| match err {
            crate::repository::RepoError::NotFound => {
                ApiError::NotFound("User not found or already deleted".into())
            }
            other => other.into(),
        })?;

        self.record_audit(
            AuditEntry::user_action(user_id, "delete", Some(actor))
                .with_old(user_snapshot(&before))
                .with_client(client.ip.clone(), client.user_agent.clone()),
        )
        .await;

        tracing::info!(user_id, actor, "user soft-deleted");
        Ok(())
    }

    /// Promote a user to moderator. Admins cannot be "promoted" down.
    pub async fn promote_to_mod(
        &self,
        admin_id: i64,
        target_id: i64,
        client: &ClientMeta,
    ) -> ApiResult<User> {
        let target = self.get_user_by_id(target_id).await?;

        if target.role == Role::Admin {
            return Err(ApiError::Conflict(
                "Admin users cannot be made moderators".into(),
            ));
        }

        let updated = self
            .users
            .update(
                target_id,
                UpdateUserFields {
                    role: Some(Role::Mod),
                    ..Default::default()
                },
            )
            .await?;

        self.record_audit(
            AuditEntry::user_action(target_id, "promote_to_mod", Some(admin_id))
                .with_old(user_snapshot(&target))
                .with_new(user_snapshot(&updated))
                .with_client(client.ip.clone(), client.user_agent.clone()),
        )
        .await;

        tracing::info!(admin_id, target_id, "user promoted to moderator");
        Ok(updated)
    }

    /// Demote a mod or admin back to a plain user.
    pub async fn demote(
        &self,
        admin_id: i64,
        target_id: i64,
        client: &ClientMeta,
    ) -> ApiResult<User> {
        if admin_id == target_id {
            return Err(ApiError::Forbidden("You cannot demote yourself".into()));
        }

        let target = self.get_user_by_id(target_id).await?;
        if target.role == Role::User {
            return Err(ApiError::Conflict("User already has the user role".into()));
        }

        let updated = self
            .users
            .update(
                target_id,
                UpdateUserFields {
                    role: Some(Role::User),
                    ..Default::default()
                },
            )
            .await?;

        self.record_audit(
            AuditEntry::user_action(target_id, "demote", Some(admin_id))
                .with_old(user_snapshot(&target))
                .with_new(user_snapshot(&updated))
                .with_client(client.ip.clone(), client.user_agent.clone()),
        )
        .await;

        tracing::info!(admin_id, target_id, "user demoted");
        Ok(updated)
    }

    /// Paginated listing plus the total count.
    pub async fn get_all_users(&self, limit: i64, offset: i64) -> ApiResult<(Vec<User>, i64)> {
        let (limit, offset) = clamp_pagination(limit, offset);
        Ok(self.users.get_all(limit, offset).await?)
    }

    /// Audit entries recorded against one user, newest first.
    pub async fn audit_trail(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<crate::models::AuditLog>> {
        let (limit, offset) = clamp_pagination(limit, offset);
        Ok(self
            .audit
            .list_by_entity("user", user_id, limit, offset)
            .await?)
    }

    /// Audit writes must not fail the operation they describe.
    async fn record_audit(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.insert(entry).await {
            tracing::error!(error = %err, "audit record write failed");
        }
    }
}
