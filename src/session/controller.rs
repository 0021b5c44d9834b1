use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, ErrorEntry, ErrorSource};
use crate::remote::{DataPayload, RemoteApi, RemoteError};
use crate::sensing::{CameraError, CameraHandle, CameraSpec, SensingContext, SensingController};
use crate::settings::{PollingSettings, Settings};
use crate::tracking::TrackingConfig;

use super::state::{ErrorOutcome, SessionSnapshot, SessionState};
use super::SharedSession;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// What one data poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Adopted,
    Failed,
    /// The previous cycle is still waiting on the backend.
    Skipped,
    /// The connection this cycle belonged to is gone.
    Stale,
    CircuitOpen,
}

/// Periodic tasks sharing one cancellation token.
struct TaskGroup {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskGroup {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }
}

/// Marks a poll as in flight until dropped.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the connection lifecycle, the pollers, the camera and the
/// activity smoother around a single [`SessionState`].
#[derive(Clone)]
pub struct SessionController {
    state: SharedSession,
    api: Arc<dyn RemoteApi>,
    errors: Option<Database>,
    polling: PollingSettings,
    tracking: TrackingConfig,
    frame_interval: Duration,
    pollers: Arc<Mutex<Option<TaskGroup>>>,
    health: Arc<Mutex<Option<TaskGroup>>>,
    smoothing: Arc<Mutex<Option<TaskGroup>>>,
    sensing: Arc<Mutex<SensingController>>,
    data_in_flight: Arc<AtomicBool>,
    eye_in_flight: Arc<AtomicBool>,
}

impl SessionController {
    pub fn new(api: Arc<dyn RemoteApi>, errors: Option<Database>, settings: &Settings) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            api,
            errors,
            polling: settings.polling.clone(),
            tracking: settings.tracking.clone(),
            frame_interval: settings.camera.frame_interval(),
            pollers: Arc::new(Mutex::new(None)),
            health: Arc::new(Mutex::new(None)),
            smoothing: Arc::new(Mutex::new(None)),
            sensing: Arc::new(Mutex::new(SensingController::new())),
            data_in_flight: Arc::new(AtomicBool::new(false)),
            eye_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shared_state(&self) -> SharedSession {
        Arc::clone(&self.state)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn connect(&self, use_webcam: bool) -> Result<SessionSnapshot> {
        if self.state.lock().await.is_connected() {
            bail!("already connected");
        }

        match self.api.connect(use_webcam).await {
            Ok(()) => {}
            Err(RemoteError::AlreadyConnected) => {
                log_warn!("backend reports an existing connection; resetting and retrying once");
                if let Err(err) = self.api.reset().await {
                    log_debug!("reset before reconnect failed: {err}");
                }
                if let Err(err) = self.api.connect(use_webcam).await {
                    return Err(self.connect_failed(err).await);
                }
            }
            Err(err) => return Err(self.connect_failed(err).await),
        }

        let generation = self.state.lock().await.begin_connection(Utc::now());
        self.spawn_pollers(generation).await;
        log_info!(
            "connected to backend ({} mode)",
            if use_webcam { "webcam" } else { "EEG-only" }
        );

        Ok(self.snapshot().await)
    }

    async fn connect_failed(&self, err: RemoteError) -> anyhow::Error {
        log_error!("connect failed: {err}");
        self.record_error(ErrorSource::Connect, err.to_string(), None).await;
        anyhow!("connect failed: {err}")
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.stop_pollers(true).await;
        if let Err(err) = self.api.disconnect().await {
            log_warn!("backend disconnect failed: {err}");
        }
        self.state.lock().await.end_connection();
        log_info!("disconnected");
        Ok(())
    }

    /// Best-effort recovery: clears the backend's connection state and ours.
    pub async fn reset(&self) -> Result<()> {
        self.stop_pollers(true).await;
        if let Err(err) = self.api.reset().await {
            log_debug!("backend reset failed: {err}");
        }
        if let Err(err) = self.api.bypass().await {
            log_debug!("backend bypass failed: {err}");
        }
        self.state.lock().await.end_connection();
        log_info!("session reset");
        Ok(())
    }

    pub async fn enable_camera(&self, spec: &CameraSpec) -> Result<(), CameraError> {
        let mut sensing = self.sensing.lock().await;
        if sensing.is_running() {
            return Ok(());
        }

        let camera = match CameraHandle::acquire(spec) {
            Ok(camera) => camera,
            Err(err) => {
                drop(sensing);
                if matches!(err, CameraError::PermissionDenied(_)) {
                    log_error!("camera access denied; enable camera permissions and try again");
                } else {
                    log_error!("camera could not be opened: {err}");
                }
                let session_id = {
                    let mut state = self.state.lock().await;
                    state.camera_active = false;
                    state.session_id()
                };
                self.record_error(ErrorSource::Camera, err.to_string(), session_id).await;
                return Err(err);
            }
        };

        self.state.lock().await.camera_active = true;

        let context = SensingContext {
            session: self.shared_state(),
            api: Arc::clone(&self.api),
            errors: self.errors.clone(),
            config: self.tracking.clone(),
            frame_interval: self.frame_interval,
        };
        if let Err(err) = sensing.start_sensing(camera, context) {
            self.state.lock().await.camera_active = false;
            return Err(CameraError::Unavailable(err.to_string()));
        }
        drop(sensing);

        self.spawn_smoother().await;
        Ok(())
    }

    pub async fn disable_camera(&self) -> Result<()> {
        stop_group(&self.smoothing, true).await;
        let stopped = self.sensing.lock().await.stop_sensing().await;
        self.state.lock().await.camera_active = false;
        stopped
    }

    pub async fn start_health_check(&self) {
        let mut group = TaskGroup::new();
        let this = self.clone();
        let token = group.token.clone();
        let period = self.polling.health_interval();

        group.handles.push(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = this.check_health_once() => {}
                            _ = token.cancelled() => break,
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        }));

        replace_group(&self.health, group).await;
    }

    /// Tear down every task and release the camera.
    pub async fn shutdown(&self) -> Result<()> {
        self.disable_camera().await?;
        stop_group(&self.health, true).await;
        if self.state.lock().await.is_connected() {
            self.disconnect().await?;
        }
        Ok(())
    }

    pub async fn check_health_once(&self) {
        match self.api.status().await {
            Ok(status) => {
                let drop_session = {
                    let mut state = self.state.lock().await;
                    state.backend_reachable = true;
                    state.using_real_data = status.using_real_data;
                    state.is_connected() && !status.is_connected()
                };
                if drop_session {
                    log_warn!("backend no longer reports a connection; dropping local session");
                    self.stop_pollers(true).await;
                    self.state.lock().await.end_connection();
                }
            }
            Err(err) => {
                log_debug!("health check failed: {err}");
                self.state.lock().await.backend_reachable = false;
            }
        }
    }

    /// One reconciliation cycle: primary endpoint, then the legacy endpoint,
    /// then rate-limited error counting.
    pub async fn poll_data_once(&self, generation: u64) -> PollOutcome {
        let Some(_in_flight) = InFlight::try_acquire(&self.data_in_flight) else {
            return PollOutcome::Skipped;
        };

        let fetched = match self.api.data().await {
            Ok(payload) => Ok(payload),
            Err(primary) => {
                log_debug!("primary data endpoint failed: {primary}");
                self.api.mental_state().await.map(DataPayload::from)
            }
        };

        let (outcome, session_id) = {
            let mut state = self.state.lock().await;
            let outcome = match fetched {
                Ok(payload) => {
                    return if state.adopt_remote(payload, generation, &self.tracking) {
                        PollOutcome::Adopted
                    } else {
                        PollOutcome::Stale
                    };
                }
                Err(_) => state.record_poll_failure(generation, Instant::now(), &self.polling),
            };
            (outcome, state.session_id())
        };

        match outcome {
            ErrorOutcome::Stale => PollOutcome::Stale,
            ErrorOutcome::Debounced => PollOutcome::Failed,
            ErrorOutcome::Counted(count) => {
                log_warn!("backend data unavailable (error {count}/{})", self.polling.max_errors);
                self.record_error(
                    ErrorSource::Poll,
                    format!("backend data unavailable (error {count})"),
                    session_id,
                )
                .await;
                PollOutcome::Failed
            }
            ErrorOutcome::CircuitOpen(count) => {
                log_error!("{count} consecutive backend errors; resetting session");
                PollOutcome::CircuitOpen
            }
        }
    }

    /// Pull the dedicated eye feed. Failures never touch the error counter.
    pub async fn poll_eye_once(&self, generation: u64) -> bool {
        let Some(_in_flight) = InFlight::try_acquire(&self.eye_in_flight) else {
            return false;
        };

        match self.api.eye_data().await {
            Ok(data) => self.state.lock().await.apply_remote_eye(data, generation),
            Err(err) => {
                log_debug!("eye data unavailable: {err}");
                false
            }
        }
    }

    async fn spawn_pollers(&self, generation: u64) {
        let mut group = TaskGroup::new();
        let period = self.polling.data_interval();

        {
            let this = self.clone();
            let token = group.token.clone();
            group.handles.push(tokio::spawn(async move {
                let mut ticker = time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let outcome = tokio::select! {
                                outcome = this.poll_data_once(generation) => outcome,
                                _ = token.cancelled() => break,
                            };
                            match outcome {
                                PollOutcome::CircuitOpen => {
                                    this.trip_circuit_breaker(generation).await;
                                    break;
                                }
                                PollOutcome::Stale => break,
                                _ => {}
                            }
                        }
                        _ = token.cancelled() => break,
                    }
                }
            }));
        }

        {
            let this = self.clone();
            let token = group.token.clone();
            group.handles.push(tokio::spawn(async move {
                let mut ticker = time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            tokio::select! {
                                _ = this.poll_eye_once(generation) => {}
                                _ = token.cancelled() => break,
                            }
                        }
                        _ = token.cancelled() => break,
                    }
                }
            }));
        }

        replace_group(&self.pollers, group).await;
    }

    async fn spawn_smoother(&self) {
        let mut group = TaskGroup::new();
        let state = self.shared_state();
        let config = self.tracking.clone();
        let token = group.token.clone();
        let period = self.polling.smoothing_interval();

        group.handles.push(tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut guard = state.lock().await;
                        if !guard.camera_active {
                            break;
                        }
                        guard.smoothing_tick(&config, &mut rng);
                    }
                    _ = token.cancelled() => break,
                }
            }
        }));

        replace_group(&self.smoothing, group).await;
    }

    /// Called from the data poller itself, so it must not join its own task.
    async fn trip_circuit_breaker(&self, generation: u64) {
        if self.state.lock().await.generation != generation {
            return;
        }

        stop_group(&self.pollers, false).await;
        if let Err(err) = self.api.disconnect().await {
            log_debug!("disconnect after repeated errors failed: {err}");
        }

        let session_id = {
            let mut state = self.state.lock().await;
            let session_id = state.session_id();
            state.end_connection();
            session_id
        };

        self.record_error(
            ErrorSource::CircuitBreaker,
            format!(
                "session reset after more than {} backend errors",
                self.polling.max_errors
            ),
            session_id,
        )
        .await;
    }

    async fn stop_pollers(&self, join: bool) {
        stop_group(&self.pollers, join).await;
    }

    async fn record_error(&self, source: ErrorSource, message: String, session_id: Option<String>) {
        let Some(db) = &self.errors else {
            return;
        };
        let entry = ErrorEntry::now(source, message, session_id);
        if let Err(err) = db.append_error(&entry).await {
            log_warn!("failed to record {source} error: {err:?}");
        }
    }
}

async fn replace_group(slot: &Mutex<Option<TaskGroup>>, group: TaskGroup) {
    let previous = slot.lock().await.replace(group);
    if let Some(previous) = previous {
        previous.token.cancel();
    }
}

async fn stop_group(slot: &Mutex<Option<TaskGroup>>, join: bool) {
    let Some(group) = slot.lock().await.take() else {
        return;
    };
    group.token.cancel();
    if join {
        for handle in group.handles {
            if let Err(err) = handle.await {
                log::error!("periodic task failed to join: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeApi;
    use crate::remote::{Alertness, EyeData, MentalStateData, StatusResponse};
    use crate::sensing::SyntheticScene;
    use crate::tracking::Direction;

    fn controller(api: Arc<FakeApi>) -> SessionController {
        SessionController::new(api, None, &Settings::default())
    }

    fn payload(left: f64, right: f64) -> DataPayload {
        DataPayload {
            left,
            right,
            state: "balanced".into(),
            blink: false,
            eye_position: Direction::Center,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn already_connected_resets_and_retries_once() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state
                .connect_results
                .extend([Err(RemoteError::AlreadyConnected), Ok(())]);
        });
        let controller = controller(api.clone());

        let snapshot = controller.connect(false).await.unwrap();
        assert!(snapshot.connected);
        assert_eq!(api.read(|s| (s.connect_calls, s.reset_calls)), (2, 1));

        controller.disconnect().await.unwrap();
        assert!(!controller.snapshot().await.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_gives_up_after_one_retry() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state.connect_results.extend([
                Err(RemoteError::AlreadyConnected),
                Err(RemoteError::AlreadyConnected),
            ]);
        });
        let controller = controller(api.clone());

        assert!(controller.connect(false).await.is_err());
        assert!(!controller.snapshot().await.connected);
        assert_eq!(api.read(|s| s.connect_calls), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_endpoint_is_used_when_primary_fails() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state.mental_state = Some(MentalStateData {
                left_brain_activity: 0.8,
                right_brain_activity: 0.3,
                state: "analytical".into(),
                blink_detected: false,
                eye_position: Direction::Left,
            });
        });
        let controller = controller(api.clone());
        let generation = controller.state.lock().await.begin_connection(Utc::now());
        assert_eq!(
            controller.poll_data_once(generation).await,
            PollOutcome::Adopted
        );
        let snapshot = controller.snapshot().await;
        assert!((snapshot.activity.left - 0.8).abs() < 1e-9);
        assert_eq!(snapshot.eye.direction, Direction::Left);
        assert_eq!(api.read(|s| (s.data_calls, s.mental_state_calls)), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failures_trip_the_circuit_breaker() {
        let api = Arc::new(FakeApi::new());
        let controller = controller(api.clone());
        controller.connect(false).await.unwrap();

        // Errors are counted at 0s, 5s, 10s, 15s and 20s despite 200ms polling.
        time::sleep(Duration::from_secs(24)).await;
        let snapshot = controller.snapshot().await;
        assert!(snapshot.connected);
        assert_eq!(snapshot.error_count, 5);
        assert!(api.read(|s| s.data_calls) > 100);

        // The sixth counted error at 25s exceeds the limit.
        time::sleep(Duration::from_secs(2)).await;
        let snapshot = controller.snapshot().await;
        assert!(!snapshot.connected);
        assert_eq!(api.read(|s| s.disconnect_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_are_skipped() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state.data = Some(payload(0.6, 0.6));
            state.data_delay = Some(Duration::from_secs(1));
        });
        let controller = controller(api.clone());
        let generation = controller.state.lock().await.begin_connection(Utc::now());

        let (first, second) = tokio::join!(
            controller.poll_data_once(generation),
            controller.poll_data_once(generation)
        );
        assert_eq!(first, PollOutcome::Adopted);
        assert_eq!(second, PollOutcome::Skipped);
        assert_eq!(api.read(|s| s.data_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_drops_in_flight_poll() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state.data = Some(payload(0.9, 0.2));
            state.data_delay = Some(Duration::from_millis(500));
        });
        let controller = controller(api.clone());
        controller.connect(false).await.unwrap();

        time::sleep(Duration::from_millis(100)).await;
        controller.disconnect().await.unwrap();
        time::sleep(Duration::from_secs(1)).await;

        let state = controller.state.lock().await;
        assert!(state.remote.is_none());
        assert!(!controller.data_in_flight.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn eye_feed_sets_alertness() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state.eye = Some(EyeData {
                eye_position: Direction::Right,
                blink: false,
                alertness: Alertness::Sleepy,
            });
        });
        let controller = controller(api.clone());
        let generation = controller.state.lock().await.begin_connection(Utc::now());

        assert!(controller.poll_eye_once(generation).await);
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.alertness, Alertness::Sleepy);
        assert_eq!(snapshot.eye.direction, Direction::Right);
        assert_eq!(snapshot.error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn health_check_drops_session_the_backend_forgot() {
        let api = Arc::new(FakeApi::new());
        let controller = controller(api.clone());
        controller.connect(false).await.unwrap();

        api.with(|state| {
            state.status_reachable = true;
            state.status = StatusResponse {
                connected: Some(false),
                device_connected: None,
                using_real_data: true,
            };
        });
        controller.check_health_once().await;

        let snapshot = controller.snapshot().await;
        assert!(snapshot.backend_reachable);
        assert!(snapshot.using_real_data);
        assert!(!snapshot.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_backend_is_flagged() {
        let api = Arc::new(FakeApi::new());
        let controller = controller(api);
        controller.state.lock().await.backend_reachable = true;
        controller.check_health_once().await;
        assert!(!controller.snapshot().await.backend_reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_drives_eye_and_activity() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| state.data = Some(payload(0.6, 0.65)));
        let controller = controller(api.clone());
        controller.connect(true).await.unwrap();
        controller
            .enable_camera(&CameraSpec::Synthetic(SyntheticScene::looking(
                Direction::Left,
            )))
            .await
            .unwrap();

        time::sleep(Duration::from_millis(300)).await;
        // Stop feeding remote data so local smoothing is not overwritten.
        api.with(|state| state.data = None);
        time::sleep(Duration::from_secs(3)).await;

        let snapshot = controller.snapshot().await;
        assert!(snapshot.camera_active);
        assert_eq!(snapshot.eye.direction, Direction::Left);
        assert!(snapshot.activity.right > 0.8, "right = {}", snapshot.activity.right);
        assert!(snapshot.activity.left < 0.3, "left = {}", snapshot.activity.left);
        assert!(api.read(|s| !s.webcam_posts.is_empty()));

        controller.shutdown().await.unwrap();
        let snapshot = controller.snapshot().await;
        assert!(!snapshot.camera_active);
        assert!(!snapshot.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_keeps_camera_direction() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| state.data = Some(payload(0.6, 0.65)));
        let controller = controller(api.clone());
        controller
            .enable_camera(&CameraSpec::Synthetic(SyntheticScene::looking(
                Direction::Left,
            )))
            .await
            .unwrap();
        controller.connect(false).await.unwrap();

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.snapshot().await.eye.direction, Direction::Left);

        controller.disconnect().await.unwrap();
        assert_eq!(controller.snapshot().await.eye.direction, Direction::Left);

        controller.connect(false).await.unwrap();
        time::sleep(Duration::from_millis(300)).await;
        api.with(|state| state.data = None);
        time::sleep(Duration::from_secs(3)).await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.eye.direction, Direction::Left);
        assert!(snapshot.activity.right > 0.8, "right = {}", snapshot.activity.right);
        assert!(snapshot.activity.left < 0.3, "left = {}", snapshot.activity.left);

        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn camera_start_replaces_remote_eye() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| {
            state.eye = Some(EyeData {
                eye_position: Direction::Right,
                blink: false,
                alertness: Alertness::Awake,
            });
        });
        let controller = controller(api.clone());
        controller.connect(false).await.unwrap();

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(controller.snapshot().await.eye.direction, Direction::Right);

        controller
            .enable_camera(&CameraSpec::Synthetic(SyntheticScene::looking(
                Direction::Center,
            )))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(controller.snapshot().await.eye.direction, Direction::Center);

        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_periods_do_not_stop_the_tasks() {
        let api = Arc::new(FakeApi::new());
        api.with(|state| state.data = Some(payload(0.6, 0.65)));
        let mut settings = Settings::default();
        settings.polling.health_interval_ms = 0;
        settings.polling.data_interval_ms = 0;
        settings.polling.smoothing_interval_ms = 0;
        settings.camera.fps = u32::MAX;
        let controller = SessionController::new(api.clone(), None, &settings);

        controller.start_health_check().await;
        controller.connect(false).await.unwrap();
        controller
            .enable_camera(&CameraSpec::Synthetic(SyntheticScene::looking(
                Direction::Right,
            )))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(5)).await;

        let snapshot = controller.snapshot().await;
        assert!(snapshot.camera_active);
        assert!(snapshot.using_remote_data);
        assert!(api.read(|s| s.data_calls) > 2);

        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_camera_stays_inactive() {
        let api = Arc::new(FakeApi::new());
        let controller = controller(api);
        let dir = tempfile::tempdir().unwrap();

        let err = controller
            .enable_camera(&CameraSpec::Frames(dir.path().join("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, CameraError::Unavailable(_)));
        assert!(!controller.snapshot().await.camera_active);
    }
}
