use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::types::{
    ConnectRequest, DataPayload, ErrorBody, EyeData, EyeDataResponse, MentalStateData,
    MentalStateResponse, StatusResponse, WebcamData,
};

/// Sentinel error the backend returns when a device session already exists.
pub const ALREADY_CONNECTED: &str = "already_connected";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("backend reported error: {0}")]
    Reported(String),
    #[error("backend already has an active connection")]
    AlreadyConnected,
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Unreachable(err.to_string())
        }
    }
}

/// Everything the session needs from the backend.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn status(&self) -> Result<StatusResponse, RemoteError>;
    async fn connect(&self, use_webcam: bool) -> Result<(), RemoteError>;
    async fn disconnect(&self) -> Result<(), RemoteError>;
    async fn reset(&self) -> Result<(), RemoteError>;
    async fn bypass(&self) -> Result<(), RemoteError>;
    async fn data(&self) -> Result<DataPayload, RemoteError>;
    async fn mental_state(&self) -> Result<MentalStateData, RemoteError>;
    async fn eye_data(&self) -> Result<EyeData, RemoteError>;
    async fn post_webcam_data(&self, data: WebcamData) -> Result<(), RemoteError>;
}

/// reqwest-backed client for the JSON/HTTP backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("hemiscope/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self.http.get(self.url(path)).send().await?;
        read_json(response).await
    }

    async fn post_ack(&self, path: &str) -> Result<(), RemoteError> {
        let response = self.http.post(self.url(path)).send().await?;
        expect_ack(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Status(status.as_u16()));
    }
    response.json::<T>().await.map_err(RemoteError::from)
}

/// Any 2xx counts as success unless the body carries an `error` or `success: false`.
async fn expect_ack(response: Response) -> Result<(), RemoteError> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    if let Some(error) = body.error {
        if error == ALREADY_CONNECTED {
            return Err(RemoteError::AlreadyConnected);
        }
        return Err(RemoteError::Reported(error));
    }
    if !status.is_success() {
        return Err(RemoteError::Status(status.as_u16()));
    }
    if body.success == Some(false) {
        return Err(RemoteError::Reported("request rejected".into()));
    }
    Ok(())
}

/// `/api/data` answers `{"error": ...}` with HTTP 200 when no device is connected.
pub fn parse_data_payload(value: Value) -> Result<DataPayload, RemoteError> {
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(RemoteError::Reported(error.to_string()));
    }
    serde_json::from_value(value).map_err(|err| RemoteError::Malformed(err.to_string()))
}

fn unwrap_envelope<T>(
    success: bool,
    data: Option<T>,
    error: Option<String>,
) -> Result<T, RemoteError> {
    match (success, data) {
        (true, Some(data)) => Ok(data),
        (true, None) => Err(RemoteError::Malformed("missing data field".into())),
        (false, _) => Err(RemoteError::Reported(
            error.unwrap_or_else(|| "request unsuccessful".into()),
        )),
    }
}

#[async_trait]
impl RemoteApi for BackendClient {
    async fn status(&self) -> Result<StatusResponse, RemoteError> {
        self.get_json("/api/status").await
    }

    async fn connect(&self, use_webcam: bool) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.url("/api/connect"))
            .json(&ConnectRequest { use_webcam })
            .send()
            .await?;
        expect_ack(response).await
    }

    async fn disconnect(&self) -> Result<(), RemoteError> {
        self.post_ack("/api/disconnect").await
    }

    async fn reset(&self) -> Result<(), RemoteError> {
        self.post_ack("/api/reset").await
    }

    async fn bypass(&self) -> Result<(), RemoteError> {
        self.post_ack("/api/bypass").await
    }

    async fn data(&self) -> Result<DataPayload, RemoteError> {
        let value: Value = self.get_json("/api/data").await?;
        parse_data_payload(value)
    }

    async fn mental_state(&self) -> Result<MentalStateData, RemoteError> {
        let response: MentalStateResponse = self.get_json("/api/mental_state").await?;
        unwrap_envelope(response.success, response.data, response.error)
    }

    async fn eye_data(&self) -> Result<EyeData, RemoteError> {
        let response: EyeDataResponse = self.get_json("/api/eye_data").await?;
        unwrap_envelope(response.success, response.data, response.error)
    }

    async fn post_webcam_data(&self, data: WebcamData) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.url("/api/webcam_data"))
            .json(&data)
            .send()
            .await?;
        expect_ack(response).await
    }
}
