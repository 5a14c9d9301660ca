//! Transaction entity, its status state machine, and money-movement
//! request types.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Upper bound for a single operation.
pub static MAX_TRANSACTION_AMOUNT: Lazy<Decimal> = Lazy::new(|| Decimal::from(1_000_000u32));

/// Money-movement kinds. The kind decides which parties are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TransactionType::Credit),
            "debit" => Some(TransactionType::Debit),
            "transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction lifecycle states.
///
/// `Pending` is the only non-terminal state; the only legal transitions are
/// `Pending` → {`Completed`, `Failed`, `Cancelled`}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A money-movement record. Immutable once its status is terminal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Transaction {
    pub id: i64,
    pub from_user_id: Option<i64>,
    pub to_user_id: Option<i64>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Deposit into `to_user`. No sender side.
    pub fn credit(to_user: i64, amount: Decimal, description: String) -> Self {
        Self {
            id: 0,
            from_user_id: None,
            to_user_id: Some(to_user),
            amount,
            tx_type: TransactionType::Credit,
            status: TransactionStatus::Pending,
            description,
            created_at: Utc::now(),
        }
    }

    /// Withdrawal from `from_user`. No recipient side.
    pub fn debit(from_user: i64, amount: Decimal, description: String) -> Self {
        Self {
            id: 0,
            from_user_id: Some(from_user),
            to_user_id: None,
            amount,
            tx_type: TransactionType::Debit,
            status: TransactionStatus::Pending,
            description,
            created_at: Utc::now(),
        }
    }

    /// Peer-to-peer movement between two distinct users.
    pub fn transfer(from_user: i64, to_user: i64, amount: Decimal, description: String) -> Self {
        Self {
            id: 0,
            from_user_id: Some(from_user),
            to_user_id: Some(to_user),
            amount,
            tx_type: TransactionType::Transfer,
            status: TransactionStatus::Pending,
            description,
            created_at: Utc::now(),
        }
    }

    /// Enforce amount bounds and the type/party pairing invariant.
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_amount(self.amount)?;

        match self.tx_type {
            TransactionType::Credit => {
                if self.from_user_id.is_some() || self.to_user_id.is_none() {
                    return Err(ApiError::Validation(
                        "Credit requires a recipient and no sender".into(),
                    ));
                }
            }
            TransactionType::Debit => {
                if self.from_user_id.is_none() || self.to_user_id.is_some() {
                    return Err(ApiError::Validation(
                        "Debit requires a sender and no recipient".into(),
                    ));
                }
            }
            TransactionType::Transfer => {
                let (from, to) = match (self.from_user_id, self.to_user_id) {
                    (Some(f), Some(t)) => (f, t),
                    _ => {
                        return Err(ApiError::Validation(
                            "Transfer requires both a sender and a recipient".into(),
                        ))
                    }
                };
                if from == to {
                    return Err(ApiError::Validation(
                        "Cannot transfer money to yourself".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Advance the state machine. Terminal states are final, and same-state
    /// transitions are rejected.
    pub fn set_status(&mut self, next: TransactionStatus) -> Result<(), ApiError> {
        if self.status == next {
            return Err(ApiError::Conflict(format!(
                "Transaction already in state '{}'",
                self.status
            )));
        }
        if self.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Transaction in terminal state '{}' cannot move to '{}'",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

/// Validate a monetary amount: strictly positive, bounded, at most two
/// fractional digits.
pub fn validate_amount(amount: Decimal) -> Result<(), ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "Amount must be greater than zero".into(),
        ));
    }
    if amount > *MAX_TRANSACTION_AMOUNT {
        return Err(ApiError::Validation(
            "Amount exceeds the maximum of 1,000,000".into(),
        ));
    }
    if amount.scale() > 2 && amount.normalize().scale() > 2 {
        return Err(ApiError::Validation(
            "Amount may have at most two decimal places".into(),
        ));
    }
    Ok(())
}

/// Transfer request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransferRequest {
    pub to_user_id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.to_user_id <= 0 {
            return Err(ApiError::Validation("Invalid recipient user id".into()));
        }
        validate_amount(self.amount)
    }
}

/// Credit (deposit) request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreditRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

impl CreditRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_amount(self.amount)
    }
}

/// Debit (withdrawal) request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DebitRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

impl DebitRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_amount(self.amount)
    }
}

/// Client-facing transaction view.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionSummary {
    pub id: i64,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: String,
}

impl From<&Transaction> for TransactionSummary {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            amount: tx.amount,
            tx_type: tx.tx_type,
            status: tx.status,
            description: tx.description.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_pending_reaches_each_terminal_state() {
        for terminal in [
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            let mut tx = Transaction::credit(1, dec("10.00"), String::new());
            tx.set_status(terminal).unwrap();
            assert_eq!(tx.status, terminal);
        }
    }

    #[test]
    fn test_no_exit_from_terminal_state() {
        let mut tx = Transaction::credit(1, dec("10.00"), String::new());
        tx.set_status(TransactionStatus::Completed).unwrap();

        assert!(tx.set_status(TransactionStatus::Failed).is_err());
        assert!(tx.set_status(TransactionStatus::Pending).is_err());
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_same_state_transition_rejected() {
        let mut tx = Transaction::debit(1, dec("10.00"), String::new());
        assert!(tx.set_status(TransactionStatus::Pending).is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(validate_amount(dec("0.01")).is_ok());
        assert!(validate_amount(dec("1000000")).is_ok());
        assert!(validate_amount(dec("1000000.00")).is_ok());
        assert!(validate_amount(dec("1000000.01")).is_err());
        assert!(validate_amount(dec("0")).is_err());
        assert!(validate_amount(dec("-5")).is_err());
        assert!(validate_amount(dec("1.999")).is_err());
        // Trailing zeros beyond two places normalize away.
        assert!(validate_amount(dec("1.2300")).is_ok());
    }

    #[test]
    fn test_transfer_party_rules() {
        let tx = Transaction::transfer(1, 1, dec("5.00"), String::new());
        assert!(tx.validate().is_err());

        let tx = Transaction::transfer(1, 2, dec("5.00"), String::new());
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_type_party_nullability() {
        let credit = Transaction::credit(7, dec("5.00"), String::new());
        assert!(credit.from_user_id.is_none());
        assert!(credit.validate().is_ok());

        let debit = Transaction::debit(7, dec("5.00"), String::new());
        assert!(debit.to_user_id.is_none());
        assert!(debit.validate().is_ok());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(TransactionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::from_str("unknown"), None);
    }
}
