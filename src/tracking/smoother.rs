use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::TrackingConfig;
use super::estimator::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLabel {
    Analytical,
    Creative,
    Balanced,
}

impl ActivityLabel {
    pub fn derive(left: f64, right: f64, ratio: f64) -> Self {
        if left > right * ratio {
            ActivityLabel::Analytical
        } else if right > left * ratio {
            ActivityLabel::Creative
        } else {
            ActivityLabel::Balanced
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "analytical" => Some(ActivityLabel::Analytical),
            "creative" => Some(ActivityLabel::Creative),
            "balanced" => Some(ActivityLabel::Balanced),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Analytical => "analytical",
            ActivityLabel::Creative => "creative",
            ActivityLabel::Balanced => "balanced",
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Left/right "hemisphere" activity scalars plus the label derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    pub left: f64,
    pub right: f64,
    pub label: ActivityLabel,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self {
            left: 0.5,
            right: 0.5,
            label: ActivityLabel::Balanced,
        }
    }
}

impl ActivityState {
    pub fn new(left: f64, right: f64, config: &TrackingConfig) -> Self {
        Self {
            left,
            right,
            label: ActivityLabel::derive(left, right, config.label_ratio),
        }
    }
}

/// Extra inputs that shape a smoothing tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothingContext {
    pub direction: Direction,
    pub sleepy: bool,
}

/// One smoothing tick. Returns `None` when neither scalar would move by at
/// least `min_change`, so callers can skip publishing an unchanged state.
pub fn smooth<R: Rng>(
    prev: &ActivityState,
    context: SmoothingContext,
    config: &TrackingConfig,
    rng: &mut R,
) -> Option<ActivityState> {
    let (mut left, mut right) = pull(prev.left, prev.right, context.direction, config);

    if context.sleepy {
        let mean = (left + right) / 2.0;
        left += (mean - left) * config.sleepy_blend;
        right += (mean - right) * config.sleepy_blend;
    }

    left += jitter(rng, config.jitter);
    right += jitter(rng, config.jitter);

    let left = clamp(left, config);
    let right = clamp(right, config);

    if (left - prev.left).abs() < config.min_change
        && (right - prev.right).abs() < config.min_change
    {
        return None;
    }

    Some(ActivityState::new(left, right, config))
}

fn pull(left: f64, right: f64, direction: Direction, config: &TrackingConfig) -> (f64, f64) {
    match direction {
        Direction::Left => (
            left - (left - config.side_low_target) * config.side_pull_rate,
            right + (config.side_high_target - right) * config.side_pull_rate,
        ),
        Direction::Right => (
            left + (config.side_high_target - left) * config.side_pull_rate,
            right - (right - config.side_low_target) * config.side_pull_rate,
        ),
        Direction::Center => (
            left + (config.center_left_target - left) * config.center_pull_rate,
            right + (config.center_right_target - right) * config.center_pull_rate,
        ),
    }
}

fn jitter<R: Rng>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

fn clamp(value: f64, config: &TrackingConfig) -> f64 {
    if value.is_nan() {
        return config.activity_min;
    }
    value.clamp(config.activity_min, config.activity_max)
}
