//! Withdrawal API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/withdrawals | POST | 商家/骑手申请提现 |
//! | /api/withdrawals | GET | 列表 (`?account_id=`) |
//! | /api/withdrawals/{id}/process | POST | 管理端处理 |

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest(
        "/api/withdrawals",
        Router::new()
            .route("/", post(handler::request).get(handler::list))
            .route("/{id}/process", post(handler::process)),
    )
}
