//! # prism-recovery
//!
//! Turns raw failure messages into a two-level taxonomy (a coarse
//! [`ErrorType`](prism_entity::ErrorType) and a fine error code), maps codes
//! to user-facing messages and recovery actions, and persists classified
//! failures through an [`ErrorLogSink`].
//!
//! Everything except [`ErrorLogger`] is pure and stateless.

pub mod alert;
pub mod classifier;
pub mod codes;
pub mod logger;
pub mod messages;
pub mod policy;
pub mod sink;

pub use alert::{AlertNotifier, CriticalAlert, TracingAlertNotifier};
pub use classifier::{Classification, categorize_error, classify, extract_error_code};
pub use logger::{ErrorContext, ErrorLogger, LoggedError};
pub use messages::get_user_friendly_message;
pub use policy::{get_recovery_action, is_critical_error};
pub use sink::{ErrorLogSink, InMemoryErrorLogSink};
