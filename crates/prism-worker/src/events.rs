//! Lifecycle events published by the scheduler.

use serde::{Deserialize, Serialize};

use prism_core::types::JobId;
use prism_entity::JobRecord;

/// One lifecycle transition, as seen by notification and UI consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum JobEvent {
    /// The job entered the pending queue (submit, automatic retry, or manual retry).
    Waiting { job_id: JobId },
    /// The job was handed to the processor.
    Active { job: JobRecord },
    /// The processor reported progress.
    Progress { job: JobRecord, percent: u8 },
    /// The job finished successfully. Carries no result value.
    Completed { job: JobRecord },
    /// The job reached a terminal failure.
    Failed { job: JobRecord, error: String },
}

impl JobEvent {
    /// The job this event is about.
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Waiting { job_id } => *job_id,
            Self::Active { job }
            | Self::Progress { job, .. }
            | Self::Completed { job }
            | Self::Failed { job, .. } => job.id,
        }
    }

    /// Event name as used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Waiting { .. } => "waiting",
            Self::Active { .. } => "active",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
