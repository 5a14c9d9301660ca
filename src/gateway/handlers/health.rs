//! Health and metrics endpoints.

use crate::gateway::state::AppState;
use crate::middleware::metrics::MetricsSnapshot;
use crate::migration::{MigrationConfig, Runner};
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Liveness plus migration status. Answers GET and HEAD.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut response = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    });

    if let Err(err) = state.db.health_check().await {
        tracing::error!(error = %err, "database health check failed");
        response["status"] = json!("degraded");
        response["database"] = json!({ "status": "unreachable" });
        return Json(response);
    }

    let runner = Runner::new(
        state.db.pool().clone(),
        MigrationConfig {
            verbose: false,
            ..MigrationConfig::default()
        },
    );

    match runner.status().await {
        Ok(status) => {
            response["migration"] = json!({
                "current_version": status.current_version,
                "applied_count": status.applied_count,
                "pending_count": status.pending_count,
                "status": status.system_health,
                "checksum_valid": status.checksum_valid,
            });
        }
        Err(err) => {
            tracing::error!(error = %err, "migration status unavailable");
            response["migration"] = json!({
                "status": "error",
                "error": "migration status unavailable",
            });
        }
    }

    Json(response)
}

/// JSON metrics snapshot.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
