//! 模拟协作方（用于演示程序与测试），不依赖真实定位硬件与系统弹窗。

use crate::provider::{
    AuthorizationHandler, PermissionProvider, PositionBatchHandler, PositionSource,
};
use domain::{AuthorizationStatus, PositionSample};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const METERS_PER_DEGREE: f64 = 111_320.0;

/// 每批样本数上限。
pub const MAX_BATCH_SIZE: usize = 1000;

struct PermissionState {
    status: AuthorizationStatus,
    handler: Option<Arc<dyn AuthorizationHandler>>,
}

/// 模拟权限提供者。
///
/// `prompt_outcome` 为 `None` 时弹窗永不应答，需由调用方通过 [`respond`](Self::respond) 扮演用户。
pub struct SimulatedPermissionProvider {
    state: Arc<Mutex<PermissionState>>,
    prompt_outcome: Option<AuthorizationStatus>,
    prompt_delay: Duration,
    requests: AtomicUsize,
}

impl SimulatedPermissionProvider {
    pub fn new(initial: AuthorizationStatus) -> Self {
        Self::with_prompt(initial, None, Duration::ZERO)
    }

    pub fn with_prompt(
        initial: AuthorizationStatus,
        prompt_outcome: Option<AuthorizationStatus>,
        prompt_delay: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(PermissionState {
                status: initial,
                handler: None,
            })),
            prompt_outcome,
            prompt_delay,
            requests: AtomicUsize::new(0),
        }
    }

    /// 模拟用户在弹窗中作出选择（或在系统设置中修改授权）。
    pub fn respond(&self, status: AuthorizationStatus) {
        deliver_status(&self.state, status);
    }

    /// 已收到的授权请求次数。
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for SimulatedPermissionProvider {
    fn current_status(&self) -> AuthorizationStatus {
        lock(&self.state).status
    }

    fn request_authorization(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if lock(&self.state).status.is_determined() {
            debug!(target: "locstream.simulated", "prompt_skipped_already_determined");
            return;
        }
        let Some(outcome) = self.prompt_outcome else {
            info!(target: "locstream.simulated", "prompt_waiting_for_user");
            return;
        };

        info!(
            target: "locstream.simulated",
            outcome = %outcome,
            delay_ms = self.prompt_delay.as_millis() as u64,
            "prompt_shown"
        );
        match Handle::try_current() {
            Ok(handle) => {
                let state = Arc::clone(&self.state);
                let delay = self.prompt_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    deliver_status(&state, outcome);
                });
            }
            Err(_) => {
                warn!(target: "locstream.simulated", "prompt_answered_inline_without_runtime");
                deliver_status(&self.state, outcome);
            }
        }
    }

    fn subscribe(&self, handler: Arc<dyn AuthorizationHandler>) {
        lock(&self.state).handler = Some(handler);
    }
}

fn deliver_status(state: &Mutex<PermissionState>, status: AuthorizationStatus) {
    let handler = {
        let mut state = lock(state);
        state.status = status;
        state.handler.clone()
    };
    // 回调时不持有内部锁，处理器可以安全地回读 current_status
    if let Some(handler) = handler {
        handler.on_status_changed(status);
    }
}

/// 模拟轨迹参数：从原点出发匀速直线运动。
#[derive(Debug, Clone)]
pub struct SimulatedTrack {
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub speed_mps: f64,
    pub course_deg: f64,
    pub horizontal_accuracy_m: f64,
    /// 批次间隔
    pub interval: Duration,
    /// 每批样本数（批内样本在间隔内均匀分布，取值 1..=MAX_BATCH_SIZE）
    pub batch_size: usize,
}

impl Default for SimulatedTrack {
    fn default() -> Self {
        Self {
            origin_lat: 37.3349,
            origin_lon: -122.009,
            speed_mps: 1.4,
            course_deg: 90.0,
            horizontal_accuracy_m: 5.0,
            interval: Duration::from_secs(1),
            batch_size: 1,
        }
    }
}

impl SimulatedTrack {
    fn sanitized(mut self) -> Self {
        self.batch_size = self.batch_size.clamp(1, MAX_BATCH_SIZE);
        if self.interval.is_zero() {
            self.interval = Duration::from_millis(1);
        }
        self
    }

    /// 出发 `elapsed` 之后的位置（平面近似）。
    pub fn sample_at(&self, elapsed: Duration, started_at_ms: i64) -> PositionSample {
        let distance_m = self.speed_mps * elapsed.as_secs_f64();
        let course = self.course_deg.to_radians();
        let latitude = self.origin_lat + distance_m * course.cos() / METERS_PER_DEGREE;
        let lon_scale = METERS_PER_DEGREE * self.origin_lat.to_radians().cos().max(1e-6);
        let longitude = self.origin_lon + distance_m * course.sin() / lon_scale;
        PositionSample {
            latitude,
            longitude,
            altitude_m: None,
            horizontal_accuracy_m: self.horizontal_accuracy_m,
            vertical_accuracy_m: None,
            speed_mps: Some(self.speed_mps),
            course_deg: Some(self.course_deg),
            timestamp_ms: started_at_ms.saturating_add(elapsed.as_millis() as i64),
        }
    }
}

/// 模拟定位源：`start_updates` 后按固定间隔推送批次。
pub struct SimulatedPositionSource {
    track: SimulatedTrack,
    task: Mutex<Option<JoinHandle<()>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SimulatedPositionSource {
    pub fn new(track: SimulatedTrack) -> Self {
        Self {
            track: track.sanitized(),
            task: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn track(&self) -> &SimulatedTrack {
        &self.track
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// 推送任务是否仍在运行。
    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl PositionSource for SimulatedPositionSource {
    fn start_updates(&self, handler: Arc<dyn PositionBatchHandler>) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(target: "locstream.simulated", "updates_not_started_without_runtime");
                return;
            }
        };

        let track = self.track.clone();
        let task = handle.spawn(async move {
            let started = tokio::time::Instant::now();
            let started_at_ms = now_epoch_ms();
            let batch_size = u32::try_from(track.batch_size).unwrap_or(1).max(1);
            let step = track.interval / batch_size;
            let mut ticker = tokio::time::interval(track.interval);
            loop {
                let tick = ticker.tick().await;
                let base = tick.saturating_duration_since(started);
                let batch = (0..batch_size)
                    .map(|index| track.sample_at(base + step * index, started_at_ms))
                    .collect::<Vec<_>>();
                handler.on_batch(batch);
            }
        });

        // 替换之前的推送任务
        if let Some(previous) = lock(&self.task).replace(task) {
            previous.abort();
        }
        info!(
            target: "locstream.simulated",
            interval_ms = self.track.interval.as_millis() as u64,
            batch_size = self.track.batch_size,
            "updates_started"
        );
    }

    fn stop_updates(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            info!(target: "locstream.simulated", "updates_stopped");
        }
    }
}

impl Drop for SimulatedPositionSource {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
