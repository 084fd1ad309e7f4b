//! Fulfillment Server - 多商家外卖订单履约服务
//!
//! # 架构概述
//!
//! - **账本** (`ledger`): 嵌入式 redb 存储，每个状态变更是一次写事务
//! - **订单** (`orders`): 生命周期状态机与金额计算
//! - **抢单** (`assignment`): 骑手广播、抢单 CAS、拒单与取餐
//! - **备餐超时** (`deadline`): 可持久化、可撤销的超时计时器与迟到罚款
//! - **结算** (`settlement`): 骑手/商家结算、重试队列、提现
//! - **通知** (`notify`): 尽力而为的频道通知
//! - **HTTP API** (`api`): RESTful 接口 + SSE
//!
//! # 模块结构
//!
//! ```text
//! fulfillment-server/src/
//! ├── core/          # 配置、状态、错误、后台任务、HTTP 服务器
//! ├── ledger/        # redb 表与事务
//! ├── orders/        # OrdersManager + 金额
//! ├── assignment/    # 抢单协议
//! ├── deadline/      # 备餐超时
//! ├── settlement/    # 结算引擎、重试 worker、提现
//! ├── accounts/      # 账户与商品目录
//! ├── payment/       # 支付凭证校验
//! ├── notify/        # 通知接收端
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志
//! ```

pub mod accounts;
pub mod api;
pub mod assignment;
pub mod core;
pub mod deadline;
pub mod ledger;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod settlement;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{
    BackgroundTasks, Config, FulfillmentError, FulfillmentResult, Server, ServerState,
    build_router,
};
pub use ledger::LedgerStorage;
pub use notify::{BroadcastSink, NoopSink, NotificationSink, RecordingSink};
pub use orders::OrdersManager;
pub use payment::{HmacPaymentVerifier, PaymentVerifier};

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ______      __ _____ ____                    __
   / ____/_  __/ // __(_) / /___ ___  ___  ____  / /_
  / /_  / / / / // /_/ / / / __ `__ \/ _ \/ __ \/ __/
 / __/ / /_/ / // __/ / / / / / / / /  __/ / / / /_
/_/    \__,_/_//_/ /_/_/_/_/ /_/ /_/\___/_/ /_/\__/
    "#
    );
}
