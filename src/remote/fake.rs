//! Scriptable in-memory backend for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{RemoteApi, RemoteError};
use super::types::{DataPayload, EyeData, MentalStateData, StatusResponse, WebcamData};

#[derive(Default)]
pub struct FakeState {
    pub status: StatusResponse,
    pub status_reachable: bool,
    pub connect_results: VecDeque<Result<(), RemoteError>>,
    pub data: Option<DataPayload>,
    pub data_delay: Option<Duration>,
    pub mental_state: Option<MentalStateData>,
    pub eye: Option<EyeData>,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
    pub reset_calls: u32,
    pub data_calls: u32,
    pub mental_state_calls: u32,
    pub eye_calls: u32,
    pub webcam_posts: Vec<WebcamData>,
}

#[derive(Default)]
pub struct FakeApi {
    pub state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: FnOnce(&mut FakeState)>(&self, apply: F) {
        apply(&mut self.state.lock().unwrap());
    }

    pub fn read<T, F: FnOnce(&FakeState) -> T>(&self, read: F) -> T {
        read(&self.state.lock().unwrap())
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn status(&self) -> Result<StatusResponse, RemoteError> {
        let state = self.state.lock().unwrap();
        if state.status_reachable {
            Ok(state.status.clone())
        } else {
            Err(RemoteError::Unreachable("connection refused".into()))
        }
    }

    async fn connect(&self, _use_webcam: bool) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        state.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn disconnect(&self) -> Result<(), RemoteError> {
        self.state.lock().unwrap().disconnect_calls += 1;
        Ok(())
    }

    async fn reset(&self) -> Result<(), RemoteError> {
        self.state.lock().unwrap().reset_calls += 1;
        Ok(())
    }

    async fn bypass(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn data(&self) -> Result<DataPayload, RemoteError> {
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state.data_calls += 1;
            let result = state
                .data
                .clone()
                .ok_or_else(|| RemoteError::Reported("Not connected".into()));
            (result, state.data_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn mental_state(&self) -> Result<MentalStateData, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.mental_state_calls += 1;
        state
            .mental_state
            .clone()
            .ok_or_else(|| RemoteError::Reported("Device not connected".into()))
    }

    async fn eye_data(&self) -> Result<EyeData, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.eye_calls += 1;
        state
            .eye
            .ok_or_else(|| RemoteError::Unreachable("connection refused".into()))
    }

    async fn post_webcam_data(&self, data: WebcamData) -> Result<(), RemoteError> {
        self.state.lock().unwrap().webcam_posts.push(data);
        Ok(())
    }
}
