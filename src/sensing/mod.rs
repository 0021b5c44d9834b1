pub mod camera;
pub mod controller;
pub mod loop_worker;

pub use camera::{CameraError, CameraHandle, CameraSpec, FrameSource, SyntheticScene};
pub use controller::SensingController;
pub use loop_worker::SensingContext;
