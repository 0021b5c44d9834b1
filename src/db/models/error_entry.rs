use std::fmt;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a logged error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorSource {
    Connect,
    Poll,
    Camera,
    CircuitBreaker,
}

impl ErrorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSource::Connect => "connect",
            ErrorSource::Poll => "poll",
            ErrorSource::Camera => "camera",
            ErrorSource::CircuitBreaker => "circuit_breaker",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "connect" => Ok(ErrorSource::Connect),
            "poll" => Ok(ErrorSource::Poll),
            "camera" => Ok(ErrorSource::Camera),
            "circuit_breaker" => Ok(ErrorSource::CircuitBreaker),
            other => Err(anyhow!("unknown error source {other}")),
        }
    }
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the client-side error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
    pub source: ErrorSource,
    pub message: String,
    pub session_id: Option<String>,
}

impl ErrorEntry {
    pub fn now(
        source: ErrorSource,
        message: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            id: None,
            recorded_at: Utc::now(),
            source,
            message: message.into(),
            session_id,
        }
    }
}
