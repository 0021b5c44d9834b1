use std::sync::Arc;

use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, ErrorEntry, ErrorSource};
use crate::remote::{RemoteApi, WebcamData};
use crate::session::SharedSession;
use crate::tracking::{DirectionEstimator, EyeState, FrameSampler, TrackingConfig};

use super::camera::CameraHandle;

// Runs once per frame callback; keep quiet unless debugging.
const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_error, log_info};

/// Everything the frame loop needs besides the camera itself.
#[derive(Clone)]
pub struct SensingContext {
    pub session: SharedSession,
    pub api: Arc<dyn RemoteApi>,
    pub errors: Option<Database>,
    pub config: TrackingConfig,
    pub frame_interval: Duration,
}

pub async fn sensing_loop(
    mut camera: CameraHandle,
    context: SensingContext,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(context.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut sampler = FrameSampler::new(&context.config);
    let mut estimator = DirectionEstimator::new(context.config.clone());

    log_info!("frame loop started on {}", camera.name());
    publish(&context, estimator.eye(), false).await;

    loop {
        let blink_deadline = estimator.next_blink_deadline();

        tokio::select! {
            _ = ticker.tick() => {
                let frame = match camera.next_frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        log_error!("camera failed, stopping frame loop: {err}");
                        camera_failed(&context, err.to_string()).await;
                        break;
                    }
                };

                let Some(sample) = sampler.offer(frame.as_ref()) else {
                    continue;
                };

                let update = estimator.observe(sample, Instant::now());
                if update.direction_changed {
                    log_debug!("eye direction committed: {}", update.eye.direction);
                }
                // The session eye can be reset behind the estimator's back, so
                // every sampled frame re-asserts the current estimate.
                publish(
                    &context,
                    update.eye,
                    update.direction_changed || update.blink_started,
                )
                .await;
            }
            _ = sleep_until_blink_clear(blink_deadline), if blink_deadline.is_some() => {
                if estimator.expire_blinks(Instant::now()) {
                    publish(&context, estimator.eye(), true).await;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("frame loop shutting down");
                break;
            }
        }
    }

    camera.release();
}

async fn sleep_until_blink_clear(deadline: Option<Instant>) {
    tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)).await
}

/// Push the local eye estimate into the session and, when connected and the
/// estimate is news, forward it to the backend without waiting for the answer.
async fn publish(context: &SensingContext, eye: EyeState, news: bool) {
    let (changed, connected) = {
        let mut state = context.session.lock().await;
        (state.apply_local_eye(eye), state.is_connected())
    };

    if connected && (changed || news) {
        let api = Arc::clone(&context.api);
        tokio::spawn(async move {
            let body = WebcamData {
                eye_position: eye.direction,
                blink: eye.blink_active,
            };
            if let Err(err) = api.post_webcam_data(body).await {
                log::debug!("webcam telemetry dropped: {err}");
            }
        });
    }
}

async fn camera_failed(context: &SensingContext, message: String) {
    let session_id = {
        let mut state = context.session.lock().await;
        state.camera_active = false;
        state.session_id()
    };

    if let Some(db) = &context.errors {
        let entry = ErrorEntry::now(ErrorSource::Camera, message, session_id);
        if let Err(err) = db.append_error(&entry).await {
            log::warn!("failed to record camera error: {err:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeApi;
    use crate::sensing::camera::{CameraError, FrameSource, SyntheticScene, SyntheticSource};
    use crate::session::SessionState;
    use crate::tracking::Direction;
    use chrono::Utc;
    use image::{Rgba, RgbaImage};
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct ScriptedSource {
        frames: VecDeque<Result<Option<RgbaImage>, CameraError>>,
    }

    impl FrameSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn next_frame(&mut self) -> Result<Option<RgbaImage>, CameraError> {
            self.frames.pop_front().unwrap_or(Ok(None))
        }
    }

    fn grey(level: u8) -> RgbaImage {
        RgbaImage::from_pixel(30, 30, Rgba([level, level, level, 255]))
    }

    fn context(api: Arc<FakeApi>, config: TrackingConfig) -> SensingContext {
        let mut state = SessionState::new();
        state.begin_connection(Utc::now());
        state.camera_active = true;
        SensingContext {
            session: Arc::new(Mutex::new(state)),
            api,
            errors: None,
            config,
            frame_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_commits_direction_and_reports_it() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(api.clone(), TrackingConfig::default());
        let camera = CameraHandle::from_source(Box::new(SyntheticSource::new(
            SyntheticScene::looking(Direction::Left),
        )));
        let token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(camera, ctx.clone(), token.clone()));

        // Six sampled frames at every third 10ms callback.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.session.lock().await.eye.direction, Direction::Left);

        token.cancel();
        handle.await.unwrap();
        tokio::task::yield_now().await;

        let posts = api.read(|state| state.webcam_posts.clone());
        assert!(posts.iter().any(|post| post.eye_position == Direction::Left));
    }

    #[tokio::test(start_paused = true)]
    async fn session_eye_reset_is_reasserted() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(api, TrackingConfig::default());
        let camera = CameraHandle::from_source(Box::new(SyntheticSource::new(
            SyntheticScene::looking(Direction::Right),
        )));
        let token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(camera, ctx.clone(), token.clone()));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.session.lock().await.eye.direction, Direction::Right);

        // Same gaze from here on, so the estimator never reports a change.
        ctx.session.lock().await.eye = EyeState::default();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ctx.session.lock().await.eye.direction, Direction::Right);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loop_start_seeds_session_eye() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(api, TrackingConfig::default());
        ctx.session.lock().await.eye.direction = Direction::Left;
        let camera = CameraHandle::from_source(Box::new(ScriptedSource {
            frames: VecDeque::new(),
        }));
        let token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(camera, ctx.clone(), token.clone()));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(ctx.session.lock().await.eye, EyeState::default());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn blink_clears_without_further_frames() {
        let api = Arc::new(FakeApi::new());
        let config = TrackingConfig {
            frame_stride: 1,
            ..TrackingConfig::default()
        };
        let ctx = context(api, config);
        let camera = CameraHandle::from_source(Box::new(ScriptedSource {
            frames: VecDeque::from(vec![Ok(Some(grey(100))), Ok(Some(grey(60)))]),
        }));
        let token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(camera, ctx.clone(), token.clone()));

        // Bright frame at t=0, dark frame at t=10ms sets the blink.
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(ctx.session.lock().await.eye.blink_active);

        tokio::time::sleep(Duration::from_millis(290)).await;
        assert!(ctx.session.lock().await.eye.blink_active);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ctx.session.lock().await.eye.blink_active);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn camera_error_deactivates_camera() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(api, TrackingConfig::default());
        let camera = CameraHandle::from_source(Box::new(ScriptedSource {
            frames: VecDeque::from(vec![Err(CameraError::PermissionDenied(
                "revoked".into(),
            ))]),
        }));

        sensing_loop(camera, ctx.clone(), CancellationToken::new()).await;
        assert!(!ctx.session.lock().await.camera_active);
    }
}
