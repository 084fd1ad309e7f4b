use std::time::Duration;

use fulfillment_server::{
    BackgroundTasks, Config, Server, ServerState, api, init_logger_with_file, print_banner,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载配置并初始化日志
    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        Some(config.is_production()),
        config.log_dir.as_deref(),
    );

    print_banner();
    api::health::mark_started();
    tracing::info!(environment = %config.environment, work_dir = %config.work_dir, "Fulfillment server starting...");

    // 3. 打开账本，装配服务
    let shutdown = CancellationToken::new();
    let state = ServerState::initialize(&config, shutdown.clone())?;

    // 4. 后台任务：恢复计时器、结算重试、通知日志
    let mut tasks = BackgroundTasks::with_token(shutdown.clone());
    state.start_background_tasks(&mut tasks);

    // 5. HTTP 服务器，返回时 shutdown 已被取消
    let server = Server::new(config.clone(), state);
    let result = server.run(shutdown.clone()).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Server error");
        shutdown.cancel();
    }

    tasks
        .shutdown(Duration::from_millis(config.shutdown_timeout_ms))
        .await;
    tracing::info!("Fulfillment server stopped");
    result
}
