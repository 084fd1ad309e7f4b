//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::core::ServerState;
use shared::error::{ApiResponse, AppResult};
use shared::order::{
    CancelRequest, CreateOrderRequest, DeliverRequest, DeliveryOutcome, Order, OrderListQuery,
    RiderActionRequest, VendorActionRequest,
};

/// Place a new order
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.create_order(payload).await?;
    Ok(ApiResponse::success(order))
}

/// List orders, optionally by status
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.orders.list_orders(query.status)?;
    Ok(ApiResponse::success(orders))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    Ok(ApiResponse::success(state.orders.get_order(&id)?))
}

pub async fn confirm(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<VendorActionRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.confirm_order(&id, &payload.vendor_id)?;
    Ok(ApiResponse::success(order))
}

pub async fn start_preparing(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<VendorActionRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.start_preparing(&id, &payload.vendor_id)?;
    Ok(ApiResponse::success(order))
}

pub async fn mark_ready(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<VendorActionRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.mark_ready(&id, &payload.vendor_id)?;
    Ok(ApiResponse::success(order))
}

pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.cancel_order(&id, payload.reason)?;
    Ok(ApiResponse::success(order))
}

/// Claim a ready order (409 when another rider won)
pub async fn claim(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<RiderActionRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.claim_order(&id, &payload.rider_id)?;
    Ok(ApiResponse::success(order))
}

pub async fn reject(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<RiderActionRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.reject_claim(&id, &payload.rider_id)?;
    Ok(ApiResponse::success(order))
}

pub async fn pickup(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<RiderActionRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.confirm_pickup(&id, &payload.rider_id)?;
    Ok(ApiResponse::success(order))
}

pub async fn deliver(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<DeliverRequest>,
) -> AppResult<ApiResponse<DeliveryOutcome>> {
    let outcome = state
        .orders
        .deliver_order(&id, &payload.rider_id, payload.rating)?;
    Ok(ApiResponse::success(outcome))
}
