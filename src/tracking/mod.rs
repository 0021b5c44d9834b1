pub mod config;
pub mod estimator;
pub mod sampler;
pub mod smoother;

pub use config::TrackingConfig;
pub use estimator::{Direction, DirectionEstimator, DirectionVote, EstimatorUpdate, EyeState};
pub use sampler::{sample_frame, BrightnessSample, FrameSampler};
pub use smoother::{smooth, ActivityLabel, ActivityState, SmoothingContext};
