//! Repository implementations.

pub mod error_log;

pub use error_log::ErrorLogRepository;
