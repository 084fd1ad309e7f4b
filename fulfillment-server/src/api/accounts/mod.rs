//! Accounts API Module
//!
//! 账户注册、在线状态与商品目录（管理端种子数据）

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/accounts", post(handler::register))
        .route("/api/accounts/{id}", get(handler::get_by_id))
        .route("/api/vendors/{id}/online", post(handler::set_vendor_online))
        .route("/api/riders/{id}/online", post(handler::set_rider_online))
        .route("/api/products", post(handler::upsert_product))
}
