//! Accounts API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use shared::error::{ApiResponse, AppResult};
use shared::models::{
    Account, AccountCreate, PresenceUpdate, Product, ProductUpsert, RiderProfile, VendorProfile,
};

pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<AccountCreate>,
) -> AppResult<ApiResponse<Account>> {
    let account = state.accounts.register_account(payload)?;
    tracing::info!(account_id = %account.id(), role = %account.role(), "Account registered");
    Ok(ApiResponse::success(account))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Account>> {
    Ok(ApiResponse::success(state.accounts.get_account(&id)?))
}

pub async fn set_vendor_online(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<PresenceUpdate>,
) -> AppResult<ApiResponse<VendorProfile>> {
    let vendor = state.accounts.set_vendor_online(&id, payload.is_online)?;
    Ok(ApiResponse::success(vendor))
}

/// Going offline is refused while the rider holds an order
pub async fn set_rider_online(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<PresenceUpdate>,
) -> AppResult<ApiResponse<RiderProfile>> {
    let rider = state.accounts.set_rider_online(&id, payload.is_online)?;
    Ok(ApiResponse::success(rider))
}

pub async fn upsert_product(
    State(state): State<ServerState>,
    Json(payload): Json<ProductUpsert>,
) -> AppResult<ApiResponse<Product>> {
    Ok(ApiResponse::success(state.accounts.upsert_product(payload)?))
}
