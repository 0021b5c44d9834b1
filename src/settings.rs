use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::tracking::TrackingConfig;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.into(),
            request_timeout_ms: 2000,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Cadence of the periodic tasks and the error circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub health_interval_ms: u64,
    pub data_interval_ms: u64,
    pub smoothing_interval_ms: u64,
    /// Minimum spacing between two counted errors
    pub error_debounce_ms: u64,
    /// Session resets once the error count exceeds this
    pub max_errors: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            health_interval_ms: 3000,
            data_interval_ms: 200,
            smoothing_interval_ms: 100,
            error_debounce_ms: 5000,
            max_errors: 5,
        }
    }
}

impl PollingSettings {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.max(1))
    }

    pub fn data_interval(&self) -> Duration {
        Duration::from_millis(self.data_interval_ms.max(1))
    }

    pub fn smoothing_interval(&self) -> Duration {
        Duration::from_millis(self.smoothing_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub enabled: bool,
    /// Directory of still frames played back as the camera feed
    pub frames_dir: Option<PathBuf>,
    /// Frame callbacks per second
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frames_dir: None,
            fps: 30,
        }
    }
}

impl CameraSettings {
    /// Time between frame callbacks, never shorter than a microsecond.
    pub fn frame_interval(&self) -> Duration {
        let fps = u64::from(self.fps.max(1));
        Duration::from_micros((1_000_000 / fps).max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub polling: PollingSettings,
    pub tracking: TrackingConfig,
    pub camera: CameraSettings,
    #[serde(skip)]
    pub debug: bool,
}

impl Settings {
    /// Apply `HEMISCOPE_BACKEND_URL` and `HEMISCOPE_DEBUG`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("HEMISCOPE_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().to_string();
            }
        }
        self.debug = std::env::var("HEMISCOPE_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Write the current settings out when no file exists yet, so the
    /// defaults are there to edit.
    pub fn write_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.persist(&self.get())?;
        Ok(true)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
