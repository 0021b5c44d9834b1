pub mod error_entry;

pub use error_entry::{ErrorEntry, ErrorSource};
