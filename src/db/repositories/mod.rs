pub mod error_log;

pub use error_log::MAX_ERROR_ENTRIES;
