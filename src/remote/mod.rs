pub mod client;
#[cfg(test)]
pub mod fake;
pub mod types;

pub use client::{BackendClient, RemoteApi, RemoteError, ALREADY_CONNECTED};
pub use types::{
    Alertness, DataPayload, EyeData, MentalStateData, StatusResponse, WebcamData,
};
