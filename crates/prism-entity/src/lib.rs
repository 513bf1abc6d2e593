//! # prism-entity
//!
//! Domain models shared by the scheduler, the error classifier, and the
//! error log sinks.

pub mod error_record;
pub mod job;
pub mod recovery;

pub use error_record::{ErrorRecord, ErrorType};
pub use job::{JobMetadata, JobPayload, JobRecord, JobStats, JobStatus};
pub use recovery::{RecoveryAction, RecoveryKind, RecoveryPriority};
