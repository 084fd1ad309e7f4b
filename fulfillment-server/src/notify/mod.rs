//! Notification Sink 通知接收端抽象
//!
//! 生命周期组件只依赖 [`NotificationSink`]，不关心具体传输：
//! ```text
//!         ┌────────────────────────┐
//!         │  NotificationSink Trait │  ◄── 可插拔接口
//!         └───────────┬────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! BroadcastSink    NoopSink      RecordingSink
//! (SSE 推送)       (无传输)       (测试断言)
//! ```
//!
//! 投递是尽力而为的：`publish` 不返回错误，也不会阻塞调用方。

use parking_lot::Mutex;
use shared::message::{Channel, LifecycleEvent, Notification};
use tokio::sync::broadcast;

/// 通知接收端
pub trait NotificationSink: Send + Sync {
    /// Fire-and-forget delivery to a channel
    fn publish(&self, channel: Channel, event: LifecycleEvent);

    /// Deliver the same event to several channels
    fn publish_many(&self, channels: Vec<Channel>, event: LifecycleEvent) {
        for channel in channels {
            self.publish(channel, event.clone());
        }
    }
}

/// tokio broadcast 实现，供 SSE 订阅
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, channel: Channel, event: LifecycleEvent) {
        let notification = Notification::new(channel, event);
        // 没有订阅者时 send 返回 Err，通知直接丢弃
        if self.tx.send(notification).is_err() {
            tracing::trace!("Notification dropped: no active subscribers");
        }
    }
}

/// 空实现（无实时传输的部署 / 测试）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn publish(&self, _channel: Channel, _event: LifecycleEvent) {}
}

/// 记录所有通知，测试中用于断言
#[derive(Debug, Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(Channel, LifecycleEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn published(&self) -> Vec<(Channel, LifecycleEvent)> {
        self.published.lock().clone()
    }

    /// Events delivered to one channel
    pub fn events_for(&self, channel: &Channel) -> Vec<LifecycleEvent> {
        self.published
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Number of events with the given name (see [`LifecycleEvent::name`])
    pub fn count(&self, name: &str) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|(_, e)| e.name() == name)
            .count()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, channel: Channel, event: LifecycleEvent) {
        self.published.lock().push((channel, event));
    }
}

/// 将所有通知写入结构化日志（后台监听任务）
pub async fn run_notification_logger(
    mut rx: broadcast::Receiver<Notification>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    tracing::info!("Notification logger started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Notification logger received shutdown signal");
                break;
            }
            msg = rx.recv() => match msg {
                Ok(n) => {
                    tracing::info!(
                        channel = %n.channel,
                        event = n.event.name(),
                        order_id = n.event.order_id().unwrap_or("-"),
                        "Notification published"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Notification channel closed, stopping logger");
                    break;
                }
            },
        }
    }
}
