//! Migration engine types and configuration profiles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// Fast; development only.
    Md5,
    /// Default for everything else.
    Sha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every migration applied, checksums clean.
    Healthy,
    /// Pending migrations exist.
    Warning,
    /// Checksum mismatch or system error.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One migration pair on disk, annotated with its database status.
#[derive(Debug, Clone, Serialize)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub up_sql: String,
    #[serde(skip_serializing)]
    pub down_sql: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub up_checksum: String,
    pub down_checksum: String,
    pub up_file_size: i64,
    pub down_file_size: i64,
    pub description: String,
    pub has_down_file: bool,
}

/// Overall migration-system state, surfaced by the health endpoint.
#[derive(Debug, Serialize)]
pub struct MigrationStatus {
    pub current_version: i64,
    pub total_count: usize,
    pub applied_count: usize,
    pub pending_count: usize,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub system_health: HealthStatus,
    pub checksum_valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Outcome of a single migration execution.
#[derive(Debug, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub version: i64,
    pub name: String,
    pub direction: Direction,
    pub execution_time_ms: u128,
    pub error: Option<String>,
    pub affected_rows: u64,
    pub sql_statements: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub migrations_path: PathBuf,
    pub table_name: String,
    pub checksum_algorithm: ChecksumAlgorithm,
    pub validate_checksums: bool,
    /// Tolerate on-disk edits to already-applied migrations.
    pub allow_dirty: bool,
    pub require_down_files: bool,
    pub transaction_timeout: Duration,
    pub is_cli: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_path: PathBuf::from("./migrations"),
            table_name: "schema_migrations".to_string(),
            checksum_algorithm: ChecksumAlgorithm::Sha256,
            validate_checksums: true,
            allow_dirty: false,
            require_down_files: false,
            transaction_timeout: Duration::from_secs(900),
            is_cli: false,
            dry_run: false,
            verbose: false,
        }
    }
}

impl MigrationConfig {
    /// Manual runs: verbose, DOWN files mandatory.
    pub fn cli() -> Self {
        Self {
            is_cli: true,
            verbose: true,
            require_down_files: true,
            transaction_timeout: Duration::from_secs(1800),
            ..Self::default()
        }
    }

    /// Application startup: quiet, checksums enforced.
    pub fn app_startup() -> Self {
        Self {
            verbose: false,
            validate_checksums: true,
            ..Self::default()
        }
    }

    pub fn production() -> Self {
        Self {
            validate_checksums: true,
            allow_dirty: false,
            require_down_files: true,
            verbose: true,
            transaction_timeout: Duration::from_secs(1800),
            ..Self::default()
        }
    }

    pub fn development() -> Self {
        Self {
            checksum_algorithm: ChecksumAlgorithm::Md5,
            validate_checksums: false,
            allow_dirty: true,
            verbose: true,
            ..Self::default()
        }
    }

    pub fn test() -> Self {
        Self {
            checksum_algorithm: ChecksumAlgorithm::Md5,
            validate_checksums: false,
            allow_dirty: true,
            transaction_timeout: Duration::from_secs(60),
            ..Self::default()
        }
    }
}
