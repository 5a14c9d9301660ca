//! User entity, roles, and request validation.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// User roles, ordered by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Mod,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Mod => "mod",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "mod" => Some(Role::Mod),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User account. The password hash never serializes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Registration request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "Str0ng.Pass")]
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl CreateUserRequest {
    /// Validate and normalize all fields in place.
    pub fn validate(&mut self) -> Result<(), ApiError> {
        validate_name(&mut self.name)?;
        validate_email(&mut self.email)?;
        self.validate_password()?;
        self.validate_role()?;
        Ok(())
    }

    fn validate_password(&self) -> Result<(), ApiError> {
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password must not be empty".into()));
        }
        if self.confirm_password.is_empty() {
            return Err(ApiError::Validation(
                "Password confirmation must not be empty".into(),
            ));
        }
        if self.password != self.confirm_password {
            return Err(ApiError::Validation("Passwords do not match".into()));
        }
        if self.password.len() < 6 {
            return Err(ApiError::Validation(
                "Password must be at least 6 characters".into(),
            ));
        }
        if self.password.len() > 100 {
            return Err(ApiError::Validation(
                "Password must be at most 100 characters".into(),
            ));
        }
        if !is_strong_password(&self.password) {
            return Err(ApiError::Validation(
                "Password must contain at least three of: uppercase, lowercase, digit, special character"
                    .into(),
            ));
        }
        Ok(())
    }

    fn validate_role(&mut self) -> Result<(), ApiError> {
        match self.role.as_deref() {
            None | Some("") => {
                self.role = Some("user".to_string());
                Ok(())
            }
            Some(raw) => match Role::from_str(raw) {
                Some(role) => {
                    self.role = Some(role.as_str().to_string());
                    Ok(())
                }
                None => Err(ApiError::Validation(format!(
                    "Invalid role: {raw}. Valid roles: user, mod, admin"
                ))),
            },
        }
    }
}

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&mut self) -> Result<(), ApiError> {
        validate_email(&mut self.email)?;
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password must not be empty".into()));
        }
        Ok(())
    }
}

/// Login response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// Partial user update; `None` fields stay untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&mut self) -> Result<(), ApiError> {
        if self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
        {
            return Err(ApiError::Validation(
                "At least one field must be provided".into(),
            ));
        }

        if let Some(name) = self.name.as_mut() {
            validate_name(name)?;
        }
        if let Some(email) = self.email.as_mut() {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            if password.len() < 6 {
                return Err(ApiError::Validation(
                    "Password must be at least 6 characters".into(),
                ));
            }
        }
        if let Some(role) = self.role.as_mut() {
            match Role::from_str(role) {
                Some(parsed) => *role = parsed.as_str().to_string(),
                None => return Err(ApiError::Validation(format!("Invalid role: {role}"))),
            }
        }
        Ok(())
    }
}

fn validate_name(name: &mut String) -> Result<(), ApiError> {
    let trimmed = name.trim().to_string();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("Name must not be empty".into()));
    }
    if trimmed.len() < 2 {
        return Err(ApiError::Validation(
            "Name must be at least 2 characters".into(),
        ));
    }
    if trimmed.len() > 50 {
        return Err(ApiError::Validation(
            "Name must be at most 50 characters".into(),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
    {
        return Err(ApiError::Validation(
            "Name may contain only letters, digits, spaces, and . - _".into(),
        ));
    }
    *name = trimmed;
    Ok(())
}

fn validate_email(email: &mut String) -> Result<(), ApiError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(ApiError::Validation("Email must not be empty".into()));
    }
    if normalized.len() > 100 {
        return Err(ApiError::Validation(
            "Email must be at most 100 characters".into(),
        ));
    }
    if !EMAIL_PATTERN.is_match(&normalized) {
        return Err(ApiError::Validation("Invalid email format".into()));
    }
    *email = normalized;
    Ok(())
}

fn is_strong_password(password: &str) -> bool {
    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else if c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()) {
            has_special = true;
        }
    }

    [has_upper, has_lower, has_digit, has_special]
        .iter()
        .filter(|&&v| v)
        .count()
        >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateUserRequest {
        CreateUserRequest {
            name: "Jane Doe".to_string(),
            email: "Jane@Example.com".to_string(),
            password: "Pass1234!".to_string(),
            confirm_password: "Pass1234!".to_string(),
            role: None,
        }
    }

    #[test]
    fn test_register_normalizes_email_and_defaults_role() {
        let mut req = valid_request();
        req.validate().unwrap();
        assert_eq!(req.email, "jane@example.com");
        assert_eq!(req.role.as_deref(), Some("user"));
    }

    #[test]
    fn test_register_rejects_password_mismatch() {
        let mut req = valid_request();
        req.confirm_password = "Different1!".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_register_rejects_weak_password() {
        let mut req = valid_request();
        req.password = "alllowercase".to_string();
        req.confirm_password = "alllowercase".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_register_rejects_bad_email() {
        for email in ["", "not-an-email", "a@b", "a b@c.io"] {
            let mut req = valid_request();
            req.email = email.to_string();
            assert!(req.validate().is_err(), "should reject email: {email}");
        }
    }

    #[test]
    fn test_register_rejects_unknown_role() {
        let mut req = valid_request();
        req.role = Some("superuser".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::User, Role::Mod, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("root"), None);
    }

    #[test]
    fn test_update_requires_at_least_one_field() {
        let mut req = UpdateUserRequest::default();
        assert!(req.validate().is_err());

        let mut req = UpdateUserRequest {
            name: Some("New Name".to_string()),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }
}
