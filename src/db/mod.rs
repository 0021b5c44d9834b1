mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{ErrorEntry, ErrorSource};
pub use repositories::MAX_ERROR_ENTRIES;
