//! 定位流适配器：授权握手 + 回调批次转拉取式流。

use crate::error::LocationError;
use crate::provider::{
    AuthorizationHandler, PermissionProvider, PositionBatchHandler, PositionSource,
};
use crate::stream::LocationStream;
use domain::{AuthorizationStatus, PositionSample};
use locstream_telemetry::{
    record_access_denied, record_permission_request, record_samples_dropped,
    record_samples_forwarded, record_session_started, record_session_stopped,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 当前活动的输出流（至多一个）。
struct ActiveStream {
    session_id: Uuid,
    sender: mpsc::UnboundedSender<PositionSample>,
    forwarded: u64,
}

struct AdapterState {
    /// 最近一次从平台读到或经回调记录的授权状态
    status: AuthorizationStatus,
    /// 未决授权请求的完成句柄（至多一个，取出即清空）
    pending: Option<oneshot::Sender<AuthorizationStatus>>,
    active: Option<ActiveStream>,
}

pub(crate) struct AdapterInner {
    permission: Arc<dyn PermissionProvider>,
    source: Arc<dyn PositionSource>,
    state: Mutex<AdapterState>,
    /// 活动会话的替换/移除与定位源的 start_updates/stop_updates 在此锁内成对完成，
    /// 保证存在活动会话时定位源一定处于推送状态
    registration: Mutex<()>,
    /// 串行化 `start`：并发调用排队，后到者在前者结束后重新评估授权并替换会话
    start_gate: tokio::sync::Mutex<()>,
}

enum Authorization {
    Resolved(AuthorizationStatus),
    Pending {
        receiver: oneshot::Receiver<AuthorizationStatus>,
        issue_request: bool,
    },
}

/// 定位流适配器。
///
/// 构造时向权限提供者注册状态回调；`start` 成功后向定位源注册批次转发器。
/// 两个转发器都只持有弱引用，最后一个适配器句柄释放时会停止活动会话。
#[derive(Clone)]
pub struct LocationStreamAdapter {
    inner: Arc<AdapterInner>,
}

impl LocationStreamAdapter {
    pub fn new(permission: Arc<dyn PermissionProvider>, source: Arc<dyn PositionSource>) -> Self {
        let status = permission.current_status();
        let inner = Arc::new(AdapterInner {
            permission,
            source,
            state: Mutex::new(AdapterState {
                status,
                pending: None,
                active: None,
            }),
            registration: Mutex::new(()),
            start_gate: tokio::sync::Mutex::new(()),
        });
        inner.permission.subscribe(Arc::new(StatusForwarder {
            inner: Arc::downgrade(&inner),
        }));
        Self { inner }
    }

    /// 确认授权并打开位置流。
    ///
    /// 状态未决时发起授权请求并挂起，直到权限提供者回调。没有超时：平台永不回调时该调用一直挂起。
    /// 已有活动流时，新流替换旧流（旧流随即结束）。
    pub async fn start(&self) -> Result<LocationStream, LocationError> {
        let _gate = self.inner.start_gate.lock().await;

        let status = match self.inner.begin_authorization() {
            Authorization::Resolved(status) => status,
            Authorization::Pending {
                receiver,
                issue_request,
            } => {
                if issue_request {
                    record_permission_request();
                    info!(target: "locstream.location", "authorization_requested");
                    self.inner.permission.request_authorization();
                } else {
                    debug!(target: "locstream.location", "authorization_request_reused");
                }
                // 发送端存放在适配器状态中，只会随适配器一同释放；持有 `&self` 期间必有应答
                receiver.await.unwrap_or(AuthorizationStatus::Undetermined)
            }
        };

        if !status.is_authorized() {
            record_access_denied();
            warn!(target: "locstream.location", status = %status, "location_access_denied");
            return Err(LocationError::AccessDenied(status));
        }
        info!(target: "locstream.location", status = %status, "location_access_granted");
        Ok(self.inner.open_stream())
    }

    /// 停止定位并关闭活动流。可重复调用，无活动流时什么也不做。
    pub fn stop(&self) {
        self.inner.stop_session(None);
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.inner.state().status
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.state().active.is_some()
    }
}

impl AdapterInner {
    fn state(&self) -> MutexGuard<'_, AdapterState> {
        // 回调线程上无法返回错误，锁中毒时沿用内部数据
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registration(&self) -> MutexGuard<'_, ()> {
        self.registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_authorization(&self) -> Authorization {
        let mut state = self.state();
        let reported = self.permission.current_status();
        // 不存在回到 Undetermined 的路径：平台仍报未决时沿用已记录的结果
        let status = if reported.is_determined() {
            reported
        } else {
            state.status
        };
        state.status = status;
        if status.is_determined() {
            return Authorization::Resolved(status);
        }

        let (sender, receiver) = oneshot::channel();
        // 上一个等待方已被取消时，其请求仍在平台侧等待用户选择，不再重复发起
        let stale = state.pending.replace(sender);
        Authorization::Pending {
            receiver,
            issue_request: stale.is_none(),
        }
    }

    fn on_status_changed(&self, status: AuthorizationStatus) {
        if !status.is_determined() {
            debug!(target: "locstream.location", "authorization_undetermined_ignored");
            return;
        }
        let pending = {
            let mut state = self.state();
            state.status = status;
            state.pending.take()
        };
        info!(
            target: "locstream.location",
            status = %status,
            resolved = pending.is_some(),
            "authorization_status_changed"
        );
        if let Some(sender) = pending {
            // 等待方已放弃时发送失败，无需处理
            let _ = sender.send(status);
        }
    }

    fn open_stream(self: &Arc<Self>) -> LocationStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        let _registration = self.registration();
        let replaced = self.state().active.replace(ActiveStream {
            session_id,
            sender,
            forwarded: 0,
        });
        if let Some(previous) = replaced {
            record_session_stopped();
            info!(
                target: "locstream.location",
                session_id = %previous.session_id,
                forwarded = previous.forwarded,
                "location_session_replaced"
            );
        }

        record_session_started();
        info!(target: "locstream.location", session_id = %session_id, "location_session_started");
        self.source.start_updates(Arc::new(BatchForwarder {
            inner: Arc::downgrade(self),
            session_id,
        }));

        LocationStream::new(
            session_id,
            receiver,
            SessionGuard {
                inner: Arc::downgrade(self),
                session_id,
            },
        )
    }

    fn on_batch(&self, session_id: Uuid, batch: Vec<PositionSample>) {
        let total = batch.len() as u64;
        let mut forwarded = 0u64;
        let consumer_gone = {
            let mut state = self.state();
            let Some(active) = state
                .active
                .as_mut()
                .filter(|active| active.session_id == session_id)
            else {
                record_samples_dropped(total);
                debug!(
                    target: "locstream.location",
                    session_id = %session_id,
                    samples = total,
                    "batch_dropped_without_stream"
                );
                return;
            };
            let mut consumer_gone = false;
            for sample in batch {
                if active.sender.send(sample).is_err() {
                    consumer_gone = true;
                    break;
                }
                forwarded += 1;
            }
            active.forwarded += forwarded;
            consumer_gone
        };

        record_samples_forwarded(forwarded);
        debug!(
            target: "locstream.location",
            session_id = %session_id,
            samples = total,
            forwarded = forwarded,
            "batch_forwarded"
        );
        if consumer_gone {
            self.stop_session(Some(session_id));
        }
    }

    /// 结束会话。`session_id` 为 `None` 时结束任意活动会话，否则仅当其仍是活动会话时结束。
    fn stop_session(&self, session_id: Option<Uuid>) {
        let _registration = self.registration();
        let stopped = {
            let mut state = self.state();
            let matches = state.active.as_ref().is_some_and(|active| {
                session_id.is_none_or(|session_id| session_id == active.session_id)
            });
            if matches { state.active.take() } else { None }
        };
        let Some(stopped) = stopped else {
            return;
        };

        // 先关闭发送端，消费方读完已缓冲的样本后得到流结束
        drop(stopped.sender);
        self.source.stop_updates();
        record_session_stopped();
        info!(
            target: "locstream.location",
            session_id = %stopped.session_id,
            forwarded = stopped.forwarded,
            "location_session_stopped"
        );
    }
}

impl Drop for AdapterInner {
    fn drop(&mut self) {
        let active = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .active
            .take();
        if let Some(active) = active {
            self.source.stop_updates();
            record_session_stopped();
            info!(
                target: "locstream.location",
                session_id = %active.session_id,
                forwarded = active.forwarded,
                "location_session_released"
            );
        }
    }
}

/// 注册到权限提供者的回调（仅经注册可达）。
struct StatusForwarder {
    inner: Weak<AdapterInner>,
}

impl AuthorizationHandler for StatusForwarder {
    fn on_status_changed(&self, status: AuthorizationStatus) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_status_changed(status);
        }
    }
}

/// 注册到定位源的回调，绑定到单个会话；旧会话的注册收到的批次被忽略。
struct BatchForwarder {
    inner: Weak<AdapterInner>,
    session_id: Uuid,
}

impl PositionBatchHandler for BatchForwarder {
    fn on_batch(&self, batch: Vec<PositionSample>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_batch(self.session_id, batch);
        }
    }
}

/// 消费方持有的会话守卫；释放即视为消费方取消。
pub(crate) struct SessionGuard {
    inner: Weak<AdapterInner>,
    session_id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.stop_session(Some(self.session_id));
        }
    }
}
