use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::camera::CameraHandle;
use super::loop_worker::{sensing_loop, SensingContext};

/// Owns the frame loop task. The camera handle moves into the task and is
/// released when the task exits, whichever way it exits.
pub struct SensingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn start_sensing(&mut self, camera: CameraHandle, context: SensingContext) -> Result<()> {
        if self.is_running() {
            bail!("sensing already active");
        }
        // A loop that ended on its own (camera error) leaves a finished handle behind.
        self.handle = None;

        info!("starting frame loop on {}", camera.name());
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sensing_loop(camera, context, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sensing loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
