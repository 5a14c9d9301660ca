//! Persistence layer: one repository per entity, plus the shared error
//! surface.
//!
//! Repositories own the non-transactional CRUD paths. Money-moving writes
//! happen inside the transaction service's scoped transactions, which issue
//! their row-locking SQL directly against the open transaction.

pub mod audit;
pub mod balances;
pub mod transactions;
pub mod users;

pub use audit::AuditRepository;
pub use balances::BalanceRepository;
pub use transactions::TransactionRepository;
pub use users::UserRepository;

use crate::error::ApiError;

/// Repository error surface.
///
/// `NotFound` is distinct and non-fatal; `Integrity` covers unique and
/// check constraint violations; `Unavailable` covers transport failures.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                // Class 23 covers integrity constraint violations.
                if code.starts_with("23") {
                    RepoError::Integrity(db.message().to_string())
                } else {
                    RepoError::Internal(err.to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepoError::Unavailable(err.to_string())
            }
            _ => RepoError::Internal(err.to_string()),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::NotFound("Record not found".into()),
            RepoError::Integrity(msg) => ApiError::Conflict(msg),
            RepoError::Unavailable(msg) => ApiError::Unavailable(msg),
            RepoError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

/// Clamp pagination inputs: limit into [1, 100] (default 10), offset >= 0.
pub fn clamp_pagination(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 || limit > 100 { 10 } else { limit };
    let offset = offset.max(0);
    (limit, offset)
}
