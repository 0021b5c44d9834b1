//! Connection session lifecycle and the shared state the periodic tasks
//! reconcile into.

mod controller;
mod state;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use controller::{PollOutcome, SessionController};
pub use state::{ConnectionSession, ErrorOutcome, SessionSnapshot, SessionState};

pub type SharedSession = Arc<Mutex<SessionState>>;
