//! 服务器状态
//!
//! [`ServerState`] 持有所有服务的句柄，克隆成本很低（内部均为 `Arc`），
//! 作为 axum 的 `State` 在处理器之间共享。

use crate::accounts::AccountsService;
use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::deadline::PreparationDeadlineMonitor;
use crate::ledger::{LedgerStorage, StorageResult};
use crate::notify::{BroadcastSink, NotificationSink, run_notification_logger};
use crate::orders::OrdersManager;
use crate::payment::{HmacPaymentVerifier, PaymentVerifier};
use crate::settlement::{SettlementWorker, WithdrawalService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: LedgerStorage,
    /// SSE 订阅源
    pub notifications: BroadcastSink,
    pub orders: Arc<OrdersManager>,
    pub accounts: AccountsService,
    pub withdrawals: WithdrawalService,
    /// 进程级关闭信号（SSE 流随之结束）
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("http_port", &self.config.http_port)
            .field("orders", &self.orders)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Open the ledger under `work_dir` and wire every service
    pub fn initialize(config: &Config, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let ledger_path = config.ledger_path();
        if let Some(parent) = ledger_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let storage = LedgerStorage::open(&ledger_path)?;
        tracing::info!(path = %ledger_path.display(), "Ledger opened");

        let verifier = Arc::new(HmacPaymentVerifier::new(&config.payment_webhook_secret));
        Ok(Self::with_storage(config.clone(), storage, verifier, shutdown))
    }

    /// Build state over an existing ledger (tests use an in-memory one)
    pub fn with_storage(
        config: Config,
        storage: LedgerStorage,
        verifier: Arc<dyn PaymentVerifier>,
        shutdown: CancellationToken,
    ) -> Self {
        let notifications = BroadcastSink::new(config.notification_channel_capacity);
        let sink: Arc<dyn NotificationSink> = Arc::new(notifications.clone());

        let deadlines =
            PreparationDeadlineMonitor::new(storage.clone(), sink.clone()).with_shutdown(shutdown.clone());
        let orders = Arc::new(OrdersManager::new(
            storage.clone(),
            sink.clone(),
            verifier,
            deadlines,
        ));
        let withdrawals = WithdrawalService::new(
            storage.clone(),
            sink,
            config.min_withdrawal,
            config.auto_approve_withdrawals,
        );

        Self {
            accounts: AccountsService::new(storage.clone()),
            config,
            storage,
            notifications,
            orders,
            withdrawals,
            shutdown,
        }
    }

    /// Register background tasks
    ///
    /// - `deadline_restore` (Warmup): re-arm persisted preparation deadlines
    /// - `settlement_worker` (Worker): retry deferred vendor settlements
    /// - `notification_logger` (Listener): audit log of every notification
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let deadlines = self.orders.deadlines().clone();
        tasks.spawn("deadline_restore", TaskKind::Warmup, async move {
            if let Err(e) = deadlines.restore() {
                tracing::error!(error = %e, "Failed to restore preparation deadlines");
            }
        });

        let worker = SettlementWorker::new(
            self.storage.clone(),
            self.orders.settlement_engine().clone(),
        );
        let token = tasks.shutdown_token();
        tasks.spawn("settlement_worker", TaskKind::Worker, async move {
            worker.run(token).await;
        });

        let rx = self.notifications.subscribe();
        let token = tasks.shutdown_token();
        tasks.spawn("notification_logger", TaskKind::Listener, async move {
            run_notification_logger(rx, token).await;
        });

        tasks.log_summary();
    }

    /// Ledger statistics for health reporting
    pub fn ledger_stats(&self) -> StorageResult<crate::ledger::LedgerStats> {
        self.storage.get_stats()
    }
}
