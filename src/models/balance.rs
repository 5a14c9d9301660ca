//! Balance and balance-history entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// A user's current balance. Exactly one row per user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Balance {
    pub user_id: i64,
    pub amount: Decimal,
    pub last_updated_at: DateTime<Utc>,
}

/// Why a balance changed. One tag per movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HistoryReason {
    Credit,
    Debit,
    TransferIn,
    TransferOut,
}

impl HistoryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryReason::Credit => "credit",
            HistoryReason::Debit => "debit",
            HistoryReason::TransferIn => "transfer_in",
            HistoryReason::TransferOut => "transfer_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(HistoryReason::Credit),
            "debit" => Some(HistoryReason::Debit),
            "transfer_in" => Some(HistoryReason::TransferIn),
            "transfer_out" => Some(HistoryReason::TransferOut),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of a single balance delta.
///
/// Invariant: `new_amount = previous_amount + change_amount`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceHistory {
    pub id: i64,
    pub user_id: i64,
    pub previous_amount: Decimal,
    pub new_amount: Decimal,
    pub change_amount: Decimal,
    pub reason: HistoryReason,
    pub transaction_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time balance reconstruction from the history ledger.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceAtTime {
    pub user_id: i64,
    pub amount: Decimal,
    pub at_time: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_roundtrip() {
        for reason in [
            HistoryReason::Credit,
            HistoryReason::Debit,
            HistoryReason::TransferIn,
            HistoryReason::TransferOut,
        ] {
            assert_eq!(HistoryReason::from_str(reason.as_str()), Some(reason));
        }
        assert_eq!(HistoryReason::from_str("refund"), None);
    }
}
