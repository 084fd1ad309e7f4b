//! 实时通知 (Server-Sent Events)
//!
//! `GET /api/events?channel=rider:r1`
//!
//! - 不带 `channel` 时推送全部通知（管理端看板）
//! - 订阅 `rider:{id}` 时同时收到 `riders` 广播（新的可抢订单）
//! - 订阅者落后太多时跳过丢失的消息，不断开连接
//! - 服务器关闭时流随之结束

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::core::ServerState;
use shared::error::{AppError, AppResult};
use shared::message::{Channel, Notification};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/events", get(subscribe))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub channel: Option<String>,
}

/// 订阅过滤器
fn wants(subscribed: Option<&Channel>, target: &Channel) -> bool {
    match subscribed {
        None => true,
        Some(Channel::Rider(_)) if *target == Channel::Riders => true,
        Some(channel) => channel == target,
    }
}

pub async fn subscribe(
    State(state): State<ServerState>,
    Query(query): Query<EventQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let channel = query
        .channel
        .as_deref()
        .map(str::parse::<Channel>)
        .transpose()
        .map_err(|e| AppError::validation(e.to_string()))?;

    tracing::debug!(
        channel = channel.as_ref().map(|c| c.to_string()).as_deref().unwrap_or("*"),
        "SSE subscriber connected"
    );

    let rx = state.notifications.subscribe();
    let stream = notification_stream(rx, channel).take_until(state.shutdown.cancelled_owned());
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn notification_stream(
    rx: broadcast::Receiver<Notification>,
    channel: Option<Channel>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold((rx, channel), |(mut rx, channel)| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    if !wants(channel.as_ref(), &notification.channel) {
                        continue;
                    }
                    let event = match Event::default()
                        .event(notification.event.name())
                        .json_data(&notification)
                    {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to encode notification");
                            continue;
                        }
                    };
                    return Some((Ok(event), (rx, channel)));
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "SSE subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
