//! 核心模块 - 配置、状态、错误和后台任务
//!
//! - [`Config`] - 环境变量配置
//! - [`ServerState`] - 共享服务句柄
//! - [`Server`] - HTTP 服务器
//! - [`FulfillmentError`] - 领域错误
//! - [`BackgroundTasks`] - 后台任务注册表

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{FulfillmentError, FulfillmentResult};
pub use server::{Server, build_router};
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
