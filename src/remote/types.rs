//! Wire payloads exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::tracking::Direction;

/// `GET /api/status`. Older backends report `device_connected`, newer ones
/// `connected`; some send both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub connected: Option<bool>,
    #[serde(default)]
    pub device_connected: Option<bool>,
    #[serde(default)]
    pub using_real_data: bool,
}

impl StatusResponse {
    pub fn is_connected(&self) -> bool {
        self.connected.or(self.device_connected).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    pub use_webcam: bool,
}

/// `GET /api/data`, the primary activity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub left: f64,
    pub right: f64,
    pub state: String,
    #[serde(default)]
    pub blink: bool,
    #[serde(default)]
    pub eye_position: Direction,
}

/// `GET /api/mental_state`, the legacy activity payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MentalStateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<MentalStateData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MentalStateData {
    pub left_brain_activity: f64,
    pub right_brain_activity: f64,
    pub state: String,
    #[serde(default)]
    pub blink_detected: bool,
    #[serde(default)]
    pub eye_position: Direction,
}

impl From<MentalStateData> for DataPayload {
    fn from(data: MentalStateData) -> Self {
        Self {
            left: data.left_brain_activity,
            right: data.right_brain_activity,
            state: data.state,
            blink: data.blink_detected,
            eye_position: data.eye_position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alertness {
    #[default]
    Awake,
    Sleepy,
}

impl Alertness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alertness::Awake => "awake",
            Alertness::Sleepy => "sleepy",
        }
    }
}

/// `GET /api/eye_data`.
#[derive(Debug, Clone, Deserialize)]
pub struct EyeDataResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<EyeData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EyeData {
    #[serde(default)]
    pub eye_position: Direction,
    #[serde(default)]
    pub blink: bool,
    #[serde(default)]
    pub alertness: Alertness,
}

/// `POST /api/webcam_data` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebcamData {
    pub eye_position: Direction,
    pub blink: bool,
}

/// Minimal shape used to pick an error message out of any response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}
