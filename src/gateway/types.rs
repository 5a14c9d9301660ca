//! Gateway response envelopes and endpoint payloads.

use crate::models::{BalanceHistory, Transaction, TransactionSummary, User};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Standard success envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

/// Refresh payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshData {
    pub token: String,
    pub expires_in: i64,
}

/// Credit/debit payload: the transaction and the post-commit balance.
#[derive(Debug, Serialize, ToSchema)]
pub struct MoneyMovementData {
    pub transaction: TransactionSummary,
    pub new_balance: Decimal,
}

/// Paginated transaction history.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionHistoryData {
    pub transactions: Vec<Transaction>,
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
}

/// Paginated balance history.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceHistoryData {
    pub history: Vec<BalanceHistory>,
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
}

/// Paginated user listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserListData {
    pub users: Vec<User>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Common `?limit=&offset=` query parameters.
#[derive(Debug, serde::Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit_or_default(&self) -> i64 {
        self.limit.unwrap_or(10)
    }

    pub fn offset_or_default(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}
