//! Audit log entities.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A persisted audit record. Append-only.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditLog {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: String,
    pub actor_user_id: Option<i64>,
    #[schema(value_type = Object)]
    pub old_data: Option<serde_json::Value>,
    #[schema(value_type = Object)]
    pub new_data: Option<serde_json::Value>,
    pub details: String,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// An audit record about to be written.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub entity_type: String,
    pub entity_id: i64,
    pub action: String,
    pub actor_user_id: Option<i64>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub details: String,
    pub ip_address: String,
    pub user_agent: String,
}

impl AuditEntry {
    pub fn user_action(entity_id: i64, action: &str, actor: Option<i64>) -> Self {
        Self {
            entity_type: "user".to_string(),
            entity_id,
            action: action.to_string(),
            actor_user_id: actor,
            ..Default::default()
        }
    }

    pub fn with_old(mut self, old: serde_json::Value) -> Self {
        self.old_data = Some(old);
        self
    }

    pub fn with_new(mut self, new: serde_json::Value) -> Self {
        self.new_data = Some(new);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_client(mut self, ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self.user_agent = user_agent.into();
        self
    }
}
