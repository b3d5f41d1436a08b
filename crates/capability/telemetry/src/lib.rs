//! 日志初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub samples_forwarded: u64,
    pub samples_dropped: u64,
    pub permission_requests: u64,
    pub access_denied: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    samples_forwarded: AtomicU64,
    samples_dropped: AtomicU64,
    permission_requests: AtomicU64,
    access_denied: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            sessions_stopped: AtomicU64::new(0),
            samples_forwarded: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            permission_requests: AtomicU64::new(0),
            access_denied: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_stopped: self.sessions_stopped.load(Ordering::Relaxed),
            samples_forwarded: self.samples_forwarded.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            permission_requests: self.permission_requests.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录流会话开启次数。
pub fn record_session_started() {
    metrics().sessions_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录流会话结束次数（显式 stop、消费方取消或适配器释放）。
pub fn record_session_stopped() {
    metrics().sessions_stopped.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发到流中的样本数。
pub fn record_samples_forwarded(count: u64) {
    metrics()
        .samples_forwarded
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录无活动流时丢弃的样本数。
pub fn record_samples_dropped(count: u64) {
    metrics().samples_dropped.fetch_add(count, Ordering::Relaxed);
}

/// 记录向平台发起的授权请求次数。
pub fn record_permission_request() {
    metrics()
        .permission_requests
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录授权被拒次数。
pub fn record_access_denied() {
    metrics().access_denied.fetch_add(1, Ordering::Relaxed);
}
