//! Order API Module
//!
//! | 路径 | 方法 | 操作 | 调用方 |
//! |------|------|------|--------|
//! | /api/orders | POST | CreateOrder | 顾客 |
//! | /api/orders | GET | ListOrders (`?status=`) | 管理 |
//! | /api/orders/{id} | GET | GetOrder | 所有 |
//! | /api/orders/{id}/confirm | POST | ConfirmOrder | 商家 |
//! | /api/orders/{id}/preparing | POST | StartPreparing | 商家 |
//! | /api/orders/{id}/ready | POST | MarkReady | 商家 |
//! | /api/orders/{id}/cancel | POST | CancelOrder | 顾客 / 商家 / 管理 |
//! | /api/orders/{id}/claim | POST | ClaimOrder | 骑手 |
//! | /api/orders/{id}/reject | POST | RejectClaim | 骑手 |
//! | /api/orders/{id}/pickup | POST | ConfirmPickup | 骑手 |
//! | /api/orders/{id}/deliver | POST | DeliverOrder | 骑手 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        // Vendor
        .route("/{id}/confirm", post(handler::confirm))
        .route("/{id}/preparing", post(handler::start_preparing))
        .route("/{id}/ready", post(handler::mark_ready))
        .route("/{id}/cancel", post(handler::cancel))
        // Rider
        .route("/{id}/claim", post(handler::claim))
        .route("/{id}/reject", post(handler::reject))
        .route("/{id}/pickup", post(handler::pickup))
        .route("/{id}/deliver", post(handler::deliver))
}
