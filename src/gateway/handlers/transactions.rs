//! Money-movement endpoints.

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiResponse, MoneyMovementData, Pagination, TransactionHistoryData,
};
use crate::models::{
    CreditRequest, DebitRequest, TransactionSummary, TransferRequest,
};
use crate::repository::transactions::TransactionStats;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

pub async fn credit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreditRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MoneyMovementData>>)> {
    let transaction = state.transactions.credit(claims.user_id, &req).await?;
    let balance = state.balances.get_balance(claims.user_id).await?;

    tracing::info!(
        user_id = claims.user_id,
        amount = %req.amount,
        new_balance = %balance.amount,
        "credit completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            MoneyMovementData {
                transaction: TransactionSummary::from(&transaction),
                new_balance: balance.amount,
            },
            "Deposit successful",
        )),
    ))
}

pub async fn debit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DebitRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MoneyMovementData>>)> {
    let transaction = state.transactions.debit(claims.user_id, &req).await?;
    let balance = state.balances.get_balance(claims.user_id).await?;

    tracing::info!(
        user_id = claims.user_id,
        amount = %req.amount,
        new_balance = %balance.amount,
        "debit completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            MoneyMovementData {
                transaction: TransactionSummary::from(&transaction),
                new_balance: balance.amount,
            },
            "Withdrawal successful",
        )),
    ))
}

/// Transfers run through the bounded worker queue; the handler waits on the
/// job's future and relays the outcome.
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TransactionSummary>>)> {
    let result = state.queue.submit(claims.user_id, req.clone()).await?;

    let transaction = result
        .await
        .map_err(|_| ApiError::Internal("transfer worker dropped the result".into()))??;

    tracing::info!(
        from_user_id = claims.user_id,
        to_user_id = req.to_user_id,
        amount = %req.amount,
        transaction_id = transaction.id,
        "transfer completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            TransactionSummary::from(&transaction),
            "Transfer successful",
        )),
    ))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<ApiResponse<TransactionHistoryData>>> {
    let limit = page.limit_or_default();
    let offset = page.offset_or_default();

    let transactions = state
        .transactions
        .get_user_transactions(claims.user_id, limit, offset)
        .await?;

    let count = transactions.len();
    Ok(Json(ApiResponse::ok(
        TransactionHistoryData {
            transactions,
            limit,
            offset,
            count,
        },
        "Transaction history fetched successfully",
    )))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<TransactionStats>>> {
    let stats = state.transactions.user_stats(claims.user_id).await?;
    Ok(Json(ApiResponse::ok(
        stats,
        "Transaction statistics fetched successfully",
    )))
}

#[derive(Debug, serde::Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Admin listing of transactions by status.
pub async fn list_by_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<ApiResponse<Vec<crate::models::Transaction>>>> {
    let status_raw = query
        .status
        .ok_or_else(|| ApiError::Validation("Query parameter 'status' is required".into()))?;
    let status = crate::models::TransactionStatus::from_str(&status_raw).ok_or_else(|| {
        ApiError::Validation(format!(
            "Invalid status '{status_raw}'. Valid: pending, completed, failed, cancelled"
        ))
    })?;

    let transactions = state
        .transactions
        .get_by_status(status, query.limit.unwrap_or(10), query.offset.unwrap_or(0))
        .await?;

    Ok(Json(ApiResponse::ok(
        transactions,
        "Transactions listed successfully",
    )))
}

/// A transaction is visible only to its parties.
pub async fn get_transaction_by_id(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<TransactionSummary>>> {
    let transaction = state.transactions.get_transaction_by_id(id).await?;

    let is_party = transaction.from_user_id == Some(claims.user_id)
        || transaction.to_user_id == Some(claims.user_id);
    if !is_party {
        tracing::warn!(
            user_id = claims.user_id,
            transaction_id = id,
            "unauthorized transaction access attempt"
        );
        return Err(ApiError::Forbidden(
            "You do not have access to this transaction".into(),
        ));
    }

    Ok(Json(ApiResponse::ok(
        TransactionSummary::from(&transaction),
        "Transaction fetched successfully",
    )))
}
