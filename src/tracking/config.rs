use serde::{Deserialize, Serialize};

/// Tunable thresholds for the frame sampler, direction estimator and activity smoother.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Sample every Nth frame callback
    pub frame_stride: u32,
    /// Sample every Nth pixel inside a region
    pub pixel_stride: usize,

    /// Absolute change in total brightness that counts as a blink
    pub blink_delta: f64,
    /// How long a blink stays asserted
    pub blink_hold_ms: u64,

    /// Center brightness is scaled by this before computing side ratios
    pub center_weight: f64,
    /// A side ratio must exceed this to vote for that side
    pub side_ratio: f64,
    /// A side must also beat the opposite side by this factor
    pub side_margin: f64,
    /// A vote counter must exceed this to commit a direction
    pub vote_threshold: u32,
    /// Counter value given to the winning direction after a commit
    pub vote_reset_bias: u32,

    /// Fraction of the gap closed per tick while looking to one side
    pub side_pull_rate: f64,
    /// Fraction of the gap closed per tick while looking at the center
    pub center_pull_rate: f64,
    pub side_high_target: f64,
    pub side_low_target: f64,
    pub center_left_target: f64,
    pub center_right_target: f64,
    /// Uniform jitter amplitude added to each scalar per tick
    pub jitter: f64,
    pub activity_min: f64,
    pub activity_max: f64,
    /// Updates smaller than this on both scalars are dropped
    pub min_change: f64,
    /// Ratio one hemisphere must exceed the other by to leave `balanced`
    pub label_ratio: f64,
    /// Fraction blended toward the mean when the subject reads as sleepy
    pub sleepy_blend: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            frame_stride: 3,
            pixel_stride: 4,
            blink_delta: 15.0,
            blink_hold_ms: 300,
            center_weight: 0.8,
            side_ratio: 1.1,
            side_margin: 1.1,
            vote_threshold: 5,
            vote_reset_bias: 2,
            side_pull_rate: 0.2,
            center_pull_rate: 0.1,
            side_high_target: 0.9,
            side_low_target: 0.2,
            center_left_target: 0.6,
            center_right_target: 0.65,
            jitter: 0.015,
            activity_min: 0.1,
            activity_max: 0.95,
            min_change: 0.001,
            label_ratio: 1.2,
            sleepy_blend: 0.3,
        }
    }
}
