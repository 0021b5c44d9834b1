use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use super::config::TrackingConfig;
use super::sampler::BrightnessSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    #[default]
    Center,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Center => "center",
            Direction::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Direction::Left),
            "center" => Some(Direction::Center),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-direction vote counters used to debounce noisy frame estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionVote {
    pub left: u32,
    pub center: u32,
    pub right: u32,
}

impl DirectionVote {
    pub fn get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Left => self.left,
            Direction::Center => self.center,
            Direction::Right => self.right,
        }
    }

    /// Add one vote for `winner` and take one away from the others.
    pub fn cast(&mut self, winner: Direction) {
        for direction in [Direction::Left, Direction::Center, Direction::Right] {
            let slot = self.slot_mut(direction);
            if direction == winner {
                *slot = slot.saturating_add(1);
            } else {
                *slot = slot.saturating_sub(1);
            }
        }
    }

    /// First direction whose counter exceeds `threshold`.
    pub fn leader_over(&self, threshold: u32) -> Option<Direction> {
        [Direction::Left, Direction::Center, Direction::Right]
            .into_iter()
            .find(|direction| self.get(*direction) > threshold)
    }

    /// Zero every counter except `winner`, which keeps `bias` votes.
    pub fn reset_toward(&mut self, winner: Direction, bias: u32) {
        *self = Self::default();
        *self.slot_mut(winner) = bias;
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut u32 {
        match direction {
            Direction::Left => &mut self.left,
            Direction::Center => &mut self.center,
            Direction::Right => &mut self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeState {
    pub direction: Direction,
    pub blink_active: bool,
}

/// What changed after feeding one sample or expiring blink timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorUpdate {
    pub eye: EyeState,
    pub direction_changed: bool,
    pub blink_started: bool,
}

/// Frame-to-frame direction and blink estimator.
///
/// Blink clearing is driven by wall time: every threshold crossing schedules
/// its own clear `blink_hold_ms` later, and the loop driving the estimator is
/// expected to call [`DirectionEstimator::expire_blinks`] at
/// [`DirectionEstimator::next_blink_deadline`].
#[derive(Debug, Clone)]
pub struct DirectionEstimator {
    config: TrackingConfig,
    votes: DirectionVote,
    eye: EyeState,
    prev_total: Option<f64>,
    pending_clears: VecDeque<Instant>,
}

impl DirectionEstimator {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            votes: DirectionVote::default(),
            eye: EyeState::default(),
            prev_total: None,
            pending_clears: VecDeque::new(),
        }
    }

    pub fn eye(&self) -> EyeState {
        self.eye
    }

    pub fn votes(&self) -> DirectionVote {
        self.votes
    }

    pub fn next_blink_deadline(&self) -> Option<Instant> {
        self.pending_clears.front().copied()
    }

    pub fn observe(&mut self, sample: BrightnessSample, now: Instant) -> EstimatorUpdate {
        let total = sample.total();
        let mut blink_started = false;

        if let Some(prev) = self.prev_total {
            if (total - prev).abs() > self.config.blink_delta {
                blink_started = !self.eye.blink_active;
                self.eye.blink_active = true;
                self.pending_clears
                    .push_back(now + Duration::from_millis(self.config.blink_hold_ms));
            }
        }
        self.prev_total = Some(total);

        self.votes.cast(self.classify(&sample));

        let mut direction_changed = false;
        if let Some(winner) = self.votes.leader_over(self.config.vote_threshold) {
            direction_changed = winner != self.eye.direction;
            self.eye.direction = winner;
            self.votes.reset_toward(winner, self.config.vote_reset_bias);
        }

        EstimatorUpdate {
            eye: self.eye,
            direction_changed,
            blink_started,
        }
    }

    /// Fire every blink clear scheduled at or before `now`.
    pub fn expire_blinks(&mut self, now: Instant) -> bool {
        let mut cleared = false;
        while let Some(deadline) = self.pending_clears.front() {
            if *deadline > now {
                break;
            }
            self.pending_clears.pop_front();
            if self.eye.blink_active {
                self.eye.blink_active = false;
                cleared = true;
            }
        }
        cleared
    }

    /// Single-frame guess before debouncing.
    pub fn classify(&self, sample: &BrightnessSample) -> Direction {
        let weighted_center = sample.center * self.config.center_weight;
        let left_ratio = sample.left / weighted_center;
        let right_ratio = sample.right / weighted_center;

        if left_ratio > self.config.side_ratio
            && sample.left > sample.right * self.config.side_margin
        {
            Direction::Left
        } else if right_ratio > self.config.side_ratio
            && sample.right > sample.left * self.config.side_margin
        {
            Direction::Right
        } else {
            Direction::Center
        }
    }
}
