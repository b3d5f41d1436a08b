//! 拉取式位置流。

use crate::adapter::SessionGuard;
use domain::PositionSample;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use uuid::Uuid;

/// `start` 返回的位置流。
///
/// 样本按定位源推送的顺序产出。流不可克隆，同一时间只有一个消费方。
/// 调用 [`close`](Self::close) 或直接丢弃即为取消，适配器随之停止定位源；
/// 被新的 `start` 替换或适配器 `stop` 后，流在读完已缓冲样本后结束。
pub struct LocationStream {
    session_id: Uuid,
    receiver: mpsc::UnboundedReceiver<PositionSample>,
    guard: Option<SessionGuard>,
}

impl LocationStream {
    pub(crate) fn new(
        session_id: Uuid,
        receiver: mpsc::UnboundedReceiver<PositionSample>,
        guard: SessionGuard,
    ) -> Self {
        Self {
            session_id,
            receiver,
            guard: Some(guard),
        }
    }

    /// 会话标识（与日志中的 `session_id` 一致）。
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// 从消费侧关闭流。可重复调用。
    pub fn close(&mut self) {
        // 释放守卫即通知适配器停止本会话
        self.guard.take();
        self.receiver.close();
    }
}

impl Stream for LocationStream {
    type Item = PositionSample;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl fmt::Debug for LocationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationStream")
            .field("session_id", &self.session_id)
            .field("closed", &self.guard.is_none())
            .finish()
    }
}
