//! # prism-database
//!
//! PostgreSQL connection management, the migration runner, and the
//! persistent error log sink.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::ErrorLogRepository;
