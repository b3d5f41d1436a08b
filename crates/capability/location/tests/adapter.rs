use domain::{AuthorizationStatus, PositionSample};
use locstream_location::{
    AuthorizationHandler, LocationError, LocationStream, LocationStreamAdapter,
    PermissionProvider, PositionBatchHandler, PositionSource,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::StreamExt;

struct FakePermission {
    status: Mutex<AuthorizationStatus>,
    handler: Mutex<Option<Arc<dyn AuthorizationHandler>>>,
    requests: AtomicUsize,
}

impl FakePermission {
    fn new(status: AuthorizationStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            handler: Mutex::new(None),
            requests: AtomicUsize::new(0),
        })
    }

    fn respond(&self, status: AuthorizationStatus) {
        *self.status.lock().unwrap() = status;
        let handler = self.handler.lock().unwrap().clone();
        handler.expect("adapter subscribed").on_status_changed(status);
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for FakePermission {
    fn current_status(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap()
    }

    fn request_authorization(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self, handler: Arc<dyn AuthorizationHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}

#[derive(Default)]
struct FakeSource {
    handlers: Mutex<Vec<Arc<dyn PositionBatchHandler>>>,
    stops: AtomicUsize,
}

impl FakeSource {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, batch: Vec<PositionSample>) {
        let handler = self.handlers.lock().unwrap().last().cloned();
        handler.expect("registered").on_batch(batch);
    }

    fn push_via(&self, registration: usize, batch: Vec<PositionSample>) {
        let handler = self.handlers.lock().unwrap()[registration].clone();
        handler.on_batch(batch);
    }

    fn starts(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl PositionSource for FakeSource {
    fn start_updates(&self, handler: Arc<dyn PositionBatchHandler>) {
        self.handlers.lock().unwrap().push(handler);
    }

    fn stop_updates(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn sample(ts_ms: i64) -> PositionSample {
    PositionSample::new(37.0, -122.0, 5.0, ts_ms)
}

fn adapter_with(
    status: AuthorizationStatus,
) -> (LocationStreamAdapter, Arc<FakePermission>, Arc<FakeSource>) {
    let permission = FakePermission::new(status);
    let source = FakeSource::new();
    let adapter = LocationStreamAdapter::new(permission.clone(), source.clone());
    (adapter, permission, source)
}

async fn next_sample(stream: &mut LocationStream) -> Option<PositionSample> {
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream did not yield in time")
}

async fn wait_for_request(permission: &FakePermission, count: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while permission.requests() < count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("authorization was not requested");
}

#[tokio::test]
async fn denied_or_restricted_status_fails_without_registration() {
    for status in [AuthorizationStatus::Denied, AuthorizationStatus::Restricted] {
        let (adapter, permission, source) = adapter_with(status);
        let err = adapter.start().await.expect_err("access denied");
        assert_eq!(err, LocationError::AccessDenied(status));
        assert_eq!(source.starts(), 0);
        assert_eq!(permission.requests(), 0);
        assert!(!adapter.is_streaming());
    }
}

#[tokio::test]
async fn authorized_status_registers_exactly_once() {
    for status in [
        AuthorizationStatus::AuthorizedFull,
        AuthorizationStatus::AuthorizedLimited,
    ] {
        let (adapter, permission, source) = adapter_with(status);
        let _stream = adapter.start().await.expect("stream");
        assert_eq!(source.starts(), 1);
        assert_eq!(permission.requests(), 0);
        assert!(adapter.is_streaming());
    }
}

#[tokio::test]
async fn batches_are_forwarded_in_arrival_order() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let mut stream = adapter.start().await.expect("stream");

    source.push(vec![sample(1), sample(2)]);
    source.push(vec![sample(3)]);

    for expected in [1, 2, 3] {
        let received = next_sample(&mut stream).await.expect("sample");
        assert_eq!(received.timestamp_ms, expected);
    }
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let mut stream = adapter.start().await.expect("stream");

    adapter.stop();
    adapter.stop();

    assert_eq!(source.stops(), 1);
    assert!(!adapter.is_streaming());
    assert!(next_sample(&mut stream).await.is_none());
}

#[tokio::test]
async fn stop_without_stream_is_noop() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    adapter.stop();
    assert_eq!(source.stops(), 0);
}

#[tokio::test]
async fn samples_buffered_before_stop_are_still_delivered() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let mut stream = adapter.start().await.expect("stream");

    source.push(vec![sample(1)]);
    adapter.stop();

    assert_eq!(next_sample(&mut stream).await.map(|s| s.timestamp_ms), Some(1));
    assert!(next_sample(&mut stream).await.is_none());
}

#[tokio::test]
async fn dropping_stream_stops_updates_once() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let stream = adapter.start().await.expect("stream");

    drop(stream);
    assert_eq!(source.stops(), 1);
    assert!(!adapter.is_streaming());

    adapter.stop();
    assert_eq!(source.stops(), 1);
}

#[tokio::test]
async fn explicit_close_stops_updates() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let mut stream = adapter.start().await.expect("stream");

    stream.close();
    stream.close();

    assert_eq!(source.stops(), 1);
    assert!(next_sample(&mut stream).await.is_none());
    drop(stream);
    assert_eq!(source.stops(), 1);
}

#[tokio::test]
async fn batch_without_active_stream_is_dropped() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let stream = adapter.start().await.expect("stream");
    drop(stream);

    source.push(vec![sample(1)]);
    assert!(!adapter.is_streaming());
    assert_eq!(source.stops(), 1);
}

#[tokio::test]
async fn undetermined_then_granted_resolves_to_stream() {
    let (adapter, permission, source) = adapter_with(AuthorizationStatus::Undetermined);
    let pending = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });

    wait_for_request(&permission, 1).await;
    assert_eq!(source.starts(), 0);
    permission.respond(AuthorizationStatus::AuthorizedFull);

    let mut stream = pending.await.expect("join").expect("stream");
    assert_eq!(source.starts(), 1);
    assert_eq!(
        adapter.authorization_status(),
        AuthorizationStatus::AuthorizedFull
    );

    source.push(vec![sample(7)]);
    assert_eq!(next_sample(&mut stream).await.map(|s| s.timestamp_ms), Some(7));
}

#[tokio::test]
async fn undetermined_then_denied_fails() {
    let (adapter, permission, source) = adapter_with(AuthorizationStatus::Undetermined);
    let pending = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });

    wait_for_request(&permission, 1).await;
    permission.respond(AuthorizationStatus::Denied);

    let err = pending.await.expect("join").expect_err("denied");
    assert_eq!(err, LocationError::AccessDenied(AuthorizationStatus::Denied));
    assert_eq!(source.starts(), 0);
}

#[tokio::test]
async fn undetermined_callback_does_not_resolve_pending_request() {
    let (adapter, permission, _source) = adapter_with(AuthorizationStatus::Undetermined);
    let pending = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });

    wait_for_request(&permission, 1).await;
    permission.respond(AuthorizationStatus::Undetermined);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!pending.is_finished());

    permission.respond(AuthorizationStatus::AuthorizedLimited);
    assert!(pending.await.expect("join").is_ok());
}

#[tokio::test]
async fn repeated_status_callbacks_resolve_once() {
    let (adapter, permission, _source) = adapter_with(AuthorizationStatus::Undetermined);
    let pending = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });

    wait_for_request(&permission, 1).await;
    permission.respond(AuthorizationStatus::AuthorizedFull);
    permission.respond(AuthorizationStatus::Denied);

    assert!(pending.await.expect("join").is_ok());
    assert_eq!(adapter.authorization_status(), AuthorizationStatus::Denied);
}

#[tokio::test]
async fn cancelled_start_reuses_outstanding_request() {
    let (adapter, permission, source) = adapter_with(AuthorizationStatus::Undetermined);

    let first = tokio::time::timeout(Duration::from_millis(20), adapter.start()).await;
    assert!(first.is_err());
    assert_eq!(permission.requests(), 1);

    let pending = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    permission.respond(AuthorizationStatus::AuthorizedFull);

    assert!(pending.await.expect("join").is_ok());
    assert_eq!(permission.requests(), 1);
    assert_eq!(source.starts(), 1);
}

#[tokio::test]
async fn concurrent_starts_are_queued_behind_one_request() {
    let (adapter, permission, source) = adapter_with(AuthorizationStatus::Undetermined);
    let first = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });
    let second = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.start().await }
    });

    wait_for_request(&permission, 1).await;
    permission.respond(AuthorizationStatus::AuthorizedFull);

    let first = first.await.expect("join").expect("first stream");
    let second = second.await.expect("join").expect("second stream");
    assert_eq!(permission.requests(), 1);
    assert_eq!(source.starts(), 2);
    assert_ne!(first.session_id(), second.session_id());
    assert!(adapter.is_streaming());
}

#[tokio::test]
async fn new_start_replaces_previous_session() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let mut old = adapter.start().await.expect("old stream");
    let mut current = adapter.start().await.expect("new stream");

    assert!(next_sample(&mut old).await.is_none());
    drop(old);
    assert_eq!(source.stops(), 0);
    assert!(adapter.is_streaming());

    // 旧注册推送的批次被忽略
    source.push_via(0, vec![sample(1)]);
    source.push_via(1, vec![sample(2)]);
    assert_eq!(next_sample(&mut current).await.map(|s| s.timestamp_ms), Some(2));
}

#[tokio::test]
async fn dropping_adapter_stops_active_session() {
    let (adapter, _permission, source) = adapter_with(AuthorizationStatus::AuthorizedFull);
    let mut stream = adapter.start().await.expect("stream");

    drop(adapter);
    assert_eq!(source.stops(), 1);
    assert!(next_sample(&mut stream).await.is_none());

    drop(stream);
    assert_eq!(source.stops(), 1);
}

/// stop_updates 耗时较长的定位源，用于覆盖 stop 与 start 交错的时序。
#[derive(Default)]
struct SlowStopSource {
    running: AtomicBool,
    stopping: AtomicBool,
}

impl PositionSource for SlowStopSource {
    fn start_updates(&self, _handler: Arc<dyn PositionBatchHandler>) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop_updates(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(150));
        self.running.store(false, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn start_during_slow_stop_keeps_new_session_running() {
    let permission = FakePermission::new(AuthorizationStatus::AuthorizedFull);
    let source = Arc::new(SlowStopSource::default());
    let adapter = LocationStreamAdapter::new(permission, source.clone());
    let first = adapter.start().await.expect("first stream");

    let stopper = std::thread::spawn({
        let adapter = adapter.clone();
        move || adapter.stop()
    });
    tokio::time::timeout(Duration::from_secs(1), async {
        while !source.stopping.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("stop_updates entered");

    let second = adapter.start().await.expect("second stream");
    stopper.join().expect("stop thread");

    assert!(adapter.is_streaming());
    assert!(source.running.load(Ordering::SeqCst));
    assert_ne!(first.session_id(), second.session_id());
}
