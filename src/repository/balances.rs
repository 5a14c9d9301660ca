//! Balance and balance-history persistence.

use super::RepoError;
use crate::models::{Balance, BalanceAtTime, BalanceHistory, HistoryReason};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct BalanceRepository {
    pool: PgPool,
}

fn row_to_balance(row: &sqlx::postgres::PgRow) -> Balance {
    Balance {
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        last_updated_at: row.get("last_updated_at"),
    }
}

fn row_to_history(row: &sqlx::postgres::PgRow) -> Result<BalanceHistory, RepoError> {
    let reason_raw: String = row.get("reason");
    let reason = HistoryReason::from_str(&reason_raw)
        .ok_or_else(|| RepoError::Internal(format!("unknown history reason: {reason_raw}")))?;

    Ok(BalanceHistory {
        id: row.get("id"),
        user_id: row.get("user_id"),
        previous_amount: row.get("previous_amount"),
        new_amount: row.get("new_amount"),
        change_amount: row.get("change_amount"),
        reason,
        transaction_id: row.get("transaction_id"),
        created_at: row.get("created_at"),
    })
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the user's balance, creating a zero row on first access.
    pub async fn get_by_user_id(&self, user_id: i64) -> Result<Balance, RepoError> {
        let row = sqlx::query(
            "SELECT user_id, amount, last_updated_at FROM balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_balance(&row)),
            None => self.create(user_id).await,
        }
    }

    /// Insert a zero balance row.
    pub async fn create(&self, user_id: i64) -> Result<Balance, RepoError> {
        let row = sqlx::query(
            "INSERT INTO balances (user_id, amount)
             VALUES ($1, 0.00)
             RETURNING user_id, amount, last_updated_at",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_balance(&row))
    }

    /// Balance deltas for one user, newest first.
    pub async fn get_history(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BalanceHistory>, RepoError> {
        let rows = sqlx::query(
            "SELECT id, user_id, previous_amount, new_amount, change_amount,
                    reason, transaction_id, created_at
             FROM balance_history
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_history).collect()
    }

    /// Reconstruct the balance at `target_time` by summing the ledger up to
    /// that instant, clamped at zero.
    pub async fn get_balance_at_time(
        &self,
        user_id: i64,
        target_time: DateTime<Utc>,
    ) -> Result<BalanceAtTime, RepoError> {
        let total_change: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(change_amount), 0)
             FROM balance_history
             WHERE user_id = $1 AND created_at <= $2",
        )
        .bind(user_id)
        .bind(target_time)
        .fetch_one(&self.pool)
        .await?;

        let amount = total_change.max(Decimal::ZERO);

        Ok(BalanceAtTime {
            user_id,
            amount,
            at_time: target_time.to_rfc3339(),
            message: format!(
                "Balance computed as of {}",
                target_time.format("%Y-%m-%d %H:%M:%S")
            ),
        })
    }
}
