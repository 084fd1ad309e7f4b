//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`orders`] - 订单生命周期（下单 / 接单 / 抢单 / 送达）
//! - [`accounts`] - 账户、在线状态与商品
//! - [`withdrawals`] - 提现申请与处理
//! - [`events`] - SSE 实时通知
//!
//! 处理器统一返回 `AppResult<ApiResponse<T>>`，领域错误经
//! `From<FulfillmentError> for AppError` 映射为错误码与 HTTP 状态。

pub mod accounts;
pub mod events;
pub mod health;
pub mod orders;
pub mod withdrawals;
