use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::remote::{Alertness, DataPayload, EyeData};
use crate::settings::PollingSettings;
use crate::tracking::{
    smooth, ActivityLabel, ActivityState, EyeState, SmoothingContext, TrackingConfig,
};

/// Live connection to the backend. Dropped on disconnect, reset, or when the
/// circuit breaker trips.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    pub id: String,
    pub connected: bool,
    pub using_remote_data: bool,
    pub error_count: u32,
    pub last_error_at: Option<Instant>,
    pub started_at: DateTime<Utc>,
}

impl ConnectionSession {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            connected: true,
            using_remote_data: false,
            error_count: 0,
            last_error_at: None,
            started_at,
        }
    }
}

/// Result of reporting a failed poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// The failure belongs to a session that no longer exists.
    Stale,
    /// Inside the debounce window; not counted.
    Debounced,
    Counted(u32),
    /// The count exceeded the limit; the caller must reset the session.
    CircuitOpen(u32),
}

/// All state of one running client, owned by the session controller.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub connection: Option<ConnectionSession>,
    /// Bumped on every connect, disconnect and reset; poll results carry the
    /// generation they were issued under and are dropped when it moved on.
    pub generation: u64,
    pub backend_reachable: bool,
    pub using_real_data: bool,
    pub camera_active: bool,
    pub eye: EyeState,
    pub alertness: Alertness,
    pub activity: ActivityState,
    pub remote: Option<DataPayload>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: None,
            generation: 0,
            backend_reachable: false,
            using_real_data: false,
            camera_active: false,
            eye: EyeState::default(),
            alertness: Alertness::Awake,
            activity: ActivityState::default(),
            remote: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().map(|c| c.connected).unwrap_or(false)
    }

    pub fn session_id(&self) -> Option<String> {
        self.connection.as_ref().map(|c| c.id.clone())
    }

    /// True when `generation` still names the live connection.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.is_connected()
    }

    pub fn begin_connection(&mut self, started_at: DateTime<Utc>) -> u64 {
        self.generation += 1;
        self.connection = Some(ConnectionSession::new(started_at));
        self.generation
    }

    /// Drop the connection and every value learned from it. A running camera
    /// keeps owning the eye state.
    pub fn end_connection(&mut self) {
        self.generation += 1;
        self.connection = None;
        self.remote = None;
        self.activity = ActivityState::default();
        if !self.camera_active {
            self.eye = EyeState::default();
        }
        self.alertness = Alertness::Awake;
    }

    /// Adopt a well-formed remote payload wholesale. Returns false for stale results.
    pub fn adopt_remote(
        &mut self,
        payload: DataPayload,
        generation: u64,
        config: &TrackingConfig,
    ) -> bool {
        if !self.is_current(generation) {
            return false;
        }

        let label = ActivityLabel::parse(&payload.state).unwrap_or_else(|| {
            ActivityLabel::derive(payload.left, payload.right, config.label_ratio)
        });
        self.activity = ActivityState {
            left: payload.left,
            right: payload.right,
            label,
        };

        if !self.camera_active {
            self.eye = EyeState {
                direction: payload.eye_position,
                blink_active: payload.blink,
            };
        }

        if let Some(connection) = self.connection.as_mut() {
            connection.error_count = 0;
            connection.using_remote_data = true;
        }
        self.remote = Some(payload);
        true
    }

    /// Count a failed poll cycle, at most once per debounce window.
    pub fn record_poll_failure(
        &mut self,
        generation: u64,
        now: Instant,
        policy: &PollingSettings,
    ) -> ErrorOutcome {
        if !self.is_current(generation) {
            return ErrorOutcome::Stale;
        }
        let Some(connection) = self.connection.as_mut() else {
            return ErrorOutcome::Stale;
        };

        let debounce = Duration::from_millis(policy.error_debounce_ms);
        if let Some(last) = connection.last_error_at {
            if now.saturating_duration_since(last) < debounce {
                return ErrorOutcome::Debounced;
            }
        }

        connection.error_count += 1;
        connection.last_error_at = Some(now);

        if connection.error_count > policy.max_errors {
            ErrorOutcome::CircuitOpen(connection.error_count)
        } else {
            ErrorOutcome::Counted(connection.error_count)
        }
    }

    /// Merge the dedicated eye feed. Local camera estimates take precedence
    /// over the remote position, but alertness always comes from the backend.
    pub fn apply_remote_eye(&mut self, data: EyeData, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.alertness = data.alertness;
        if !self.camera_active {
            self.eye = EyeState {
                direction: data.eye_position,
                blink_active: data.blink,
            };
        }
        true
    }

    /// Returns true when the displayed eye state changed.
    pub fn apply_local_eye(&mut self, eye: EyeState) -> bool {
        if !self.camera_active || self.eye == eye {
            return false;
        }
        self.eye = eye;
        true
    }

    /// One activity smoothing tick. Runs only while the camera is active and
    /// remote data exists; returns true when the state changed.
    pub fn smoothing_tick<R: Rng>(&mut self, config: &TrackingConfig, rng: &mut R) -> bool {
        if !self.camera_active || self.remote.is_none() {
            return false;
        }

        let context = SmoothingContext {
            direction: self.eye.direction,
            sleepy: self.alertness == Alertness::Sleepy,
        };
        match smooth(&self.activity, context, config, rng) {
            Some(next) => {
                self.activity = next;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connected: self.is_connected(),
            session_id: self.session_id(),
            backend_reachable: self.backend_reachable,
            using_real_data: self.using_real_data,
            using_remote_data: self
                .connection
                .as_ref()
                .map(|c| c.using_remote_data)
                .unwrap_or(false),
            error_count: self.connection.as_ref().map(|c| c.error_count).unwrap_or(0),
            camera_active: self.camera_active,
            eye: self.eye,
            alertness: self.alertness,
            activity: self.activity,
        }
    }
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub connected: bool,
    pub session_id: Option<String>,
    pub backend_reachable: bool,
    pub using_real_data: bool,
    pub using_remote_data: bool,
    pub error_count: u32,
    pub camera_active: bool,
    pub eye: EyeState,
    pub alertness: Alertness,
    pub activity: ActivityState,
}
