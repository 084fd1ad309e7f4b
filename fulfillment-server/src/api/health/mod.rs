//! 健康检查
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 存活探针 |
//! | /health/detailed | GET | 账本统计、计时器与订阅者数量 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

use crate::core::ServerState;
use crate::ledger::LedgerStats;

const VERSION: &str = env!("CARGO_PKG_VERSION");

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// 进程启动时调用一次，之后 uptime 从此刻起算
pub fn mark_started() {
    STARTED_AT.get_or_init(Instant::now);
}

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// 进程在跑，但账本读取失败
    Degraded,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: HealthStatus,
    version: &'static str,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    status: HealthStatus,
    version: &'static str,
    uptime_seconds: u64,
    /// 内存中仍在计时的出餐截止时间
    armed_deadlines: usize,
    /// SSE 订阅者
    subscribers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger: Option<LedgerStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: VERSION,
    })
}

pub async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let uptime_seconds = STARTED_AT.get_or_init(Instant::now).elapsed().as_secs();
    let (status, ledger, error) = match state.ledger_stats() {
        Ok(stats) => (HealthStatus::Healthy, Some(stats), None),
        Err(e) => {
            tracing::warn!(error = %e, "Ledger stats unavailable");
            (HealthStatus::Degraded, None, Some(e.to_string()))
        }
    };

    Json(DetailedHealthResponse {
        status,
        version: VERSION,
        uptime_seconds,
        armed_deadlines: state.orders.deadlines().armed_count(),
        subscribers: state.notifications.receiver_count(),
        ledger,
        error,
    })
}
