//! 后台任务管理
//!
//! | 类型 | 任务 |
//! |------|------|
//! | [`TaskKind::Warmup`] | 出餐截止时间恢复（运行一次） |
//! | [`TaskKind::Worker`] | 商家结算重试 |
//! | [`TaskKind::Listener`] | 通知审计日志 |
//!
//! 所有任务共享同一个 [`CancellationToken`]，关闭时统一取消。

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 运行一次后退出属于正常
    Warmup,
    /// 直到 shutdown 才退出
    Worker,
    /// 订阅通知总线，直到 shutdown 或总线关闭
    Listener,
}

impl TaskKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warmup => "warmup",
            Self::Worker => "worker",
            Self::Listener => "listener",
        }
    }

    const fn long_running(self) -> bool {
        !matches!(self, Self::Warmup)
    }
}

struct Spawned {
    name: &'static str,
    handle: JoinHandle<()>,
}

pub struct BackgroundTasks {
    spawned: Vec<Spawned>,
    warmups: usize,
    shutdown: CancellationToken,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// 与截止时间监控器的定时器共用同一个令牌
    pub fn with_token(shutdown: CancellationToken) -> Self {
        Self {
            spawned: Vec::new(),
            warmups: 0,
            shutdown,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 启动任务；panic 被捕获并记录，长期任务提前退出会告警
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if kind.long_running() && !token.is_cancelled() => {
                    tracing::warn!(task = name, kind = kind.as_str(), "Background task exited before shutdown");
                }
                Ok(()) => {}
                Err(payload) => {
                    tracing::error!(
                        task = name,
                        kind = kind.as_str(),
                        panic = panic_message(payload.as_ref()),
                        "Background task panicked"
                    );
                }
            }
        });
        if kind == TaskKind::Warmup {
            self.warmups += 1;
        }
        self.spawned.push(Spawned { name, handle });
    }

    pub fn len(&self) -> usize {
        self.spawned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.spawned.len(),
            warmup = self.warmups,
            "Background tasks started"
        );
    }

    /// 取消令牌后等待所有任务，`timeout` 是整体上限，超时的任务被 abort
    pub async fn shutdown(self, timeout: Duration) {
        self.shutdown.cancel();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = 0usize;

        for Spawned { name, handle } in self.spawned {
            let abort = handle.abort_handle();
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = ?e, "Task join failed"),
                Err(_) => {
                    abort.abort();
                    aborted += 1;
                    tracing::warn!(task = name, "Task did not stop in time, aborted");
                }
            }
        }

        tracing::info!(aborted, "Background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
