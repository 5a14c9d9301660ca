//! Balance endpoints.

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, BalanceHistoryData, Pagination};
use crate::models::{Balance, BalanceAtTime};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct AtTimeQuery {
    pub time: Option<String>,
}

pub async fn get_current_balance(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<Balance>>> {
    let balance = state.balances.get_balance(claims.user_id).await?;
    Ok(Json(ApiResponse::ok(
        balance,
        "Balance fetched successfully",
    )))
}

pub async fn get_balance_history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<ApiResponse<BalanceHistoryData>>> {
    let limit = page.limit_or_default();
    let offset = page.offset_or_default();

    let history = state
        .balances
        .get_balance_history(claims.user_id, limit, offset)
        .await?;

    let count = history.len();
    Ok(Json(ApiResponse::ok(
        BalanceHistoryData {
            history,
            limit,
            offset,
            count,
        },
        "Balance history fetched successfully",
    )))
}

pub async fn get_balance_at_time(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AtTimeQuery>,
) -> ApiResult<Json<ApiResponse<BalanceAtTime>>> {
    let time = query
        .time
        .ok_or_else(|| ApiError::Validation("Query parameter 'time' is required".into()))?;

    let balance = state
        .balances
        .get_balance_at_time(claims.user_id, &time)
        .await?;

    Ok(Json(ApiResponse::ok(
        balance,
        "Historical balance computed successfully",
    )))
}
