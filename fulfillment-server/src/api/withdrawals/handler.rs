//! Withdrawal API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::core::ServerState;
use shared::error::{ApiResponse, AppResult};
use shared::models::{
    ProcessWithdrawalRequest, Withdrawal, WithdrawalListQuery, WithdrawalRequest,
};

pub async fn request(
    State(state): State<ServerState>,
    Json(payload): Json<WithdrawalRequest>,
) -> AppResult<ApiResponse<Withdrawal>> {
    Ok(ApiResponse::success(state.withdrawals.request_withdrawal(payload)?))
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<WithdrawalListQuery>,
) -> AppResult<ApiResponse<Vec<Withdrawal>>> {
    let withdrawals = state
        .withdrawals
        .list_withdrawals(query.account_id.as_deref())?;
    Ok(ApiResponse::success(withdrawals))
}

pub async fn process(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ProcessWithdrawalRequest>,
) -> AppResult<ApiResponse<Withdrawal>> {
    Ok(ApiResponse::success(
        state.withdrawals.process_withdrawal(&id, payload)?,
    ))
}
