// ── Polling coordinator ──
//
// One per device. Periodically reads the full device status, replaces the
// published snapshot wholesale, and adapts its interval to rate limiting.
// The interval only ratchets down again after a fully successful cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::CloudBackend;
use crate::config::PollConfig;
use crate::error::CoreError;
use crate::model::AttributeStore;

/// Result of one refresh cycle.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Updated,
    /// The previous snapshot was re-published; polling slows down.
    RateLimited { next_interval: Duration },
    Failed(CoreError),
    /// The coordinator was shut down while the call was in flight.
    Discarded,
}

/// Work that runs after every successful refresh.
///
/// Implementations log their own failures; nothing propagates back into
/// the poll loop.
#[async_trait]
pub trait RefreshHook: Send + Sync {
    async fn after_refresh(&self, snapshot: &Arc<AttributeStore>);
}

/// Adaptive interval state. Only the coordinator cycle mutates it.
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub interval: Duration,
    pub configured_interval: Duration,
    pub floor: Duration,
    pub consecutive_failures: u32,
    /// Largest delay the backend suggested since the last success.
    pub max_suggested_delay: Option<Duration>,
    pub last_snapshot: Option<Arc<AttributeStore>>,
    default_rate_limit_delay: Duration,
}

impl BackoffState {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            interval: config.base_interval(),
            configured_interval: config.scan_interval,
            floor: config.floor,
            consecutive_failures: 0,
            max_suggested_delay: None,
            last_snapshot: None,
            default_rate_limit_delay: config.default_rate_limit_delay,
        }
    }

    pub fn on_success(&mut self, snapshot: Arc<AttributeStore>) {
        self.interval = self.configured_interval.max(self.floor);
        self.consecutive_failures = 0;
        self.max_suggested_delay = None;
        self.last_snapshot = Some(snapshot);
    }

    /// Returns the interval to wait before the next attempt. Never shrinks.
    pub fn on_rate_limited(&mut self, suggested: Option<Duration>) -> Duration {
        let delay = suggested.unwrap_or(self.default_rate_limit_delay);
        self.max_suggested_delay = Some(self.max_suggested_delay.map_or(delay, |d| d.max(delay)));
        self.interval = self.interval.max(delay).max(self.floor);
        self.consecutive_failures += 1;
        self.interval
    }

    pub fn on_failure(&mut self) {
        self.consecutive_failures += 1;
    }
}

/// Cheaply cloneable handle to one device's poll loop.
#[derive(Clone)]
pub struct PollingCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    device_id: String,
    backend: Arc<dyn CloudBackend>,
    state: Mutex<BackoffState>,
    snapshot: watch::Sender<Option<Arc<AttributeStore>>>,
    cancel: CancellationToken,
    wake: Notify,
    hook: Option<Arc<dyn RefreshHook>>,
}

impl PollingCoordinator {
    pub fn new(
        device_id: impl Into<String>,
        backend: Arc<dyn CloudBackend>,
        config: &PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self::build(device_id.into(), backend, config, cancel, None)
    }

    /// Like [`new`](Self::new), running `hook` after each successful refresh.
    pub fn with_hook(
        device_id: impl Into<String>,
        backend: Arc<dyn CloudBackend>,
        config: &PollConfig,
        cancel: CancellationToken,
        hook: Arc<dyn RefreshHook>,
    ) -> Self {
        Self::build(device_id.into(), backend, config, cancel, Some(hook))
    }

    fn build(
        device_id: String,
        backend: Arc<dyn CloudBackend>,
        config: &PollConfig,
        cancel: CancellationToken,
        hook: Option<Arc<dyn RefreshHook>>,
    ) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            inner: Arc::new(CoordinatorInner {
                device_id,
                backend,
                state: Mutex::new(BackoffState::new(config)),
                snapshot,
                cancel,
                wake: Notify::new(),
                hook,
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    /// Receiver that fires on every publish, including re-publishes of an
    /// unchanged snapshot during rate limiting.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AttributeStore>>> {
        self.inner.snapshot.subscribe()
    }

    /// Latest published snapshot, if any refresh has ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<AttributeStore>> {
        self.inner.snapshot.borrow().clone()
    }

    pub async fn interval(&self) -> Duration {
        self.inner.state.lock().await.interval
    }

    pub async fn backoff(&self) -> BackoffState {
        self.inner.state.lock().await.clone()
    }

    /// Wake the loop for an immediate refresh.
    pub fn request_refresh(&self) {
        self.inner.wake.notify_one();
    }

    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Run one cycle: read status, publish, update backoff.
    pub async fn refresh(&self) -> RefreshOutcome {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return RefreshOutcome::Discarded;
        }

        debug!(device_id = %inner.device_id, "refreshing status");
        // An in-flight read runs to completion; its result is dropped after shutdown.
        let result = inner.backend.get_status(&inner.device_id).await;
        if inner.cancel.is_cancelled() {
            debug!(device_id = %inner.device_id, "discarding status read after shutdown");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(status) => {
                let store = Arc::new(AttributeStore::from_status(status));
                inner.state.lock().await.on_success(store.clone());
                inner.snapshot.send_replace(Some(store.clone()));
                if let Some(hook) = &inner.hook {
                    hook.after_refresh(&store).await;
                }
                RefreshOutcome::Updated
            }
            Err(e) if e.is_rate_limited() => {
                let mut state = inner.state.lock().await;
                let next_interval = state.on_rate_limited(e.retry_after());
                match state.last_snapshot.clone() {
                    Some(previous) => {
                        warn!(
                            device_id = %inner.device_id,
                            next_interval_secs = next_interval.as_secs_f64(),
                            "rate limited, keeping previous state"
                        );
                        // Subscribers are notified even though the content is unchanged.
                        inner.snapshot.send_replace(Some(previous));
                        RefreshOutcome::RateLimited { next_interval }
                    }
                    None => {
                        warn!(device_id = %inner.device_id, "rate limited before first state");
                        RefreshOutcome::Failed(CoreError::NotReady {
                            device_id: inner.device_id.clone(),
                            reason: e.to_string(),
                        })
                    }
                }
            }
            Err(e) => {
                inner.state.lock().await.on_failure();
                warn!(device_id = %inner.device_id, error = %e, "refresh failed");
                RefreshOutcome::Failed(e.into())
            }
        }
    }

    /// Poll until shut down. The first refresh happens immediately.
    pub async fn run(self) {
        info!(device_id = %self.inner.device_id, "poll loop started");
        loop {
            if let RefreshOutcome::Discarded = self.refresh().await {
                break;
            }
            let interval = self.interval().await;
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => break,
                () = self.inner.wake.notified() => {
                    debug!(device_id = %self.inner.device_id, "refresh requested");
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
        info!(device_id = %self.inner.device_id, "poll loop stopped");
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::testing::FakeBackend;

    fn rate_limited(secs: Option<u64>) -> samst_api::Error {
        samst_api::Error::RateLimited {
            retry_after: secs.map(Duration::from_secs),
            message: String::new(),
        }
    }

    fn setup() -> (Arc<FakeBackend>, PollingCoordinator) {
        let backend = Arc::new(FakeBackend::new(json!({
            "components": { "main": { "switch": { "switch": { "value": "on" } } } }
        })));
        let coordinator = PollingCoordinator::new(
            "dev-1",
            backend.clone(),
            &PollConfig::default(),
            CancellationToken::new(),
        );
        (backend, coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_republishes_previous_snapshot() {
        let (backend, coordinator) = setup();
        assert!(matches!(coordinator.refresh().await, RefreshOutcome::Updated));
        let first = coordinator.snapshot().unwrap();

        let rx = coordinator.subscribe();
        backend.fail_status(rate_limited(Some(30)));

        let outcome = coordinator.refresh().await;
        assert!(
            matches!(outcome, RefreshOutcome::RateLimited { next_interval } if next_interval == Duration::from_secs(30))
        );
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            coordinator.snapshot().unwrap().main_str("switch", "switch"),
            first.main_str("switch", "switch")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interval_never_decreases_while_rate_limited() {
        let (backend, coordinator) = setup();
        coordinator.refresh().await;

        backend.fail_status(rate_limited(Some(40)));
        coordinator.refresh().await;
        assert_eq!(coordinator.interval().await, Duration::from_secs(40));

        // A smaller hint, a missing hint and a plain failure all keep 40s.
        backend.fail_status(rate_limited(Some(12)));
        coordinator.refresh().await;
        backend.fail_status(rate_limited(None));
        coordinator.refresh().await;
        backend.fail_status(samst_api::Error::Timeout { timeout_secs: 30 });
        coordinator.refresh().await;
        assert_eq!(coordinator.interval().await, Duration::from_secs(40));
        assert_eq!(coordinator.backoff().await.consecutive_failures, 4);

        assert!(matches!(coordinator.refresh().await, RefreshOutcome::Updated));
        assert_eq!(coordinator.interval().await, Duration::from_secs(15));
        assert_eq!(coordinator.backoff().await.consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_hint_uses_default_delay() {
        let (backend, coordinator) = setup();
        coordinator.refresh().await;
        backend.fail_status(rate_limited(None));
        coordinator.refresh().await;
        // Default 10s is below the 15s configured interval.
        assert_eq!(coordinator.interval().await, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_before_first_snapshot_is_not_ready() {
        let (backend, coordinator) = setup();
        backend.fail_status(rate_limited(Some(20)));

        let outcome = coordinator.refresh().await;
        match outcome {
            RefreshOutcome::Failed(e) => {
                assert!(matches!(e, CoreError::NotReady { .. }));
                assert!(e.is_retryable());
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_previous_snapshot() {
        let (backend, coordinator) = setup();
        coordinator.refresh().await;
        backend.fail_status(samst_api::Error::Unavailable {
            status: 503,
            message: String::new(),
        });

        assert!(matches!(
            coordinator.refresh().await,
            RefreshOutcome::Failed(CoreError::Unavailable { .. })
        ));
        assert!(coordinator.snapshot().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn result_after_shutdown_is_discarded() {
        let (backend, coordinator) = setup();
        *backend.status_delay.lock().unwrap() = Duration::from_secs(5);

        let started = tokio::time::Instant::now();
        let c = coordinator.clone();
        let pending = tokio::spawn(async move { c.refresh().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        coordinator.shutdown();

        assert!(matches!(pending.await.unwrap(), RefreshOutcome::Discarded));
        // The read was allowed to finish before its result was dropped.
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(backend.status_calls(), 1);
        assert!(coordinator.snapshot().is_none());
        assert!(coordinator.backoff().await.last_snapshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_polls_on_interval_and_on_request() {
        let (backend, coordinator) = setup();
        let handle = coordinator.spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.status_calls(), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(backend.status_calls(), 2);

        coordinator.request_refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.status_calls(), 3);

        coordinator.shutdown();
        handle.await.unwrap();
    }

    struct CountingHook(AtomicUsize);

    #[async_trait]
    impl RefreshHook for CountingHook {
        async fn after_refresh(&self, _snapshot: &Arc<AttributeStore>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hook_runs_only_after_updates() {
        let backend = Arc::new(FakeBackend::new(json!({ "components": {} })));
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let coordinator = PollingCoordinator::with_hook(
            "dev-1",
            backend.clone(),
            &PollConfig::default(),
            CancellationToken::new(),
            hook.clone(),
        );

        coordinator.refresh().await;
        backend.fail_status(rate_limited(None));
        coordinator.refresh().await;
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }
}
