//! Append-only audit log persistence.

use super::RepoError;
use crate::models::{AuditEntry, AuditLog};
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: AuditEntry) -> Result<i64, RepoError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO audit_logs
                (entity_type, entity_id, action, actor_user_id,
                 old_data, new_data, details, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id",
        )
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.action)
        .bind(entry.actor_user_id)
        .bind(&entry.old_data)
        .bind(&entry.new_data)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn list_by_entity(
        &self,
        entity_type: &str,
        entity_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, RepoError> {
        let rows = sqlx::query(
            "SELECT id, entity_type, entity_id, action, actor_user_id,
                    old_data, new_data, details, ip_address, user_agent, created_at
             FROM audit_logs
             WHERE entity_type = $1 AND entity_id = $2
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AuditLog {
                id: row.get("id"),
                entity_type: row.get("entity_type"),
                entity_id: row.get("entity_id"),
                action: row.get("action"),
                actor_user_id: row.get("actor_user_id"),
                old_data: row.get("old_data"),
                new_data: row.get("new_data"),
                details: row.get("details"),
                ip_address: row.get("ip_address"),
                user_agent: row.get("user_agent"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
