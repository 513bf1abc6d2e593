//! Analysis job records and their lifecycle status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prism_core::types::JobId;

/// Optional library context attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    /// Library the images belong to.
    pub library_id: i64,
    /// Display name of the library.
    pub library_name: String,
    /// Display name of the pipeline.
    pub pipeline_name: String,
}

/// What a caller submits. Field names follow the camelCase wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Pipeline to run.
    pub pipeline_id: String,
    /// Images to analyze, in processing order.
    pub image_ids: Vec<String>,
    /// Submitting user.
    pub user_id: String,
    /// Optional library and pipeline display context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
}

/// Lifecycle status of a job.
///
/// `waiting -> active -> completed`, `active -> waiting` on a retryable
/// failure, `active -> failed` once attempts are exhausted, and
/// `waiting -> failed` on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, waiting for a concurrency slot.
    Waiting,
    /// Currently held by the processor.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully or cancelled.
    Failed,
}

impl JobStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as tracked by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier.
    pub id: JobId,
    /// Submitted work description.
    pub payload: JobPayload,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Completion percentage, 0 to 100.
    pub progress: u8,
    /// Attempts charged so far. Never exceeds `max_attempts`.
    pub attempts: u32,
    /// Attempt budget, at least 1.
    pub max_attempts: u32,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the latest attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job completed successfully.
    pub completed_at: Option<DateTime<Utc>>,
    /// User-facing failure message, set only while `failed`.
    pub error: Option<String>,
}

impl JobRecord {
    /// Create a new waiting job.
    pub fn new(id: JobId, payload: JobPayload, max_attempts: u32) -> Self {
        Self {
            id,
            payload,
            status: JobStatus::Waiting,
            progress: 0,
            attempts: 0,
            max_attempts,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Check if a manual retry is allowed.
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts < self.max_attempts
    }

    /// Check if the attempt budget is used up.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Job counts grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStats {
    /// Total number of tracked jobs.
    pub fn total(&self) -> usize {
        self.waiting + self.active + self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> JobPayload {
        JobPayload {
            pipeline_id: "pl-1".to_string(),
            image_ids: vec!["img-1".to_string()],
            user_id: "user-1".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_payload_uses_wire_names() {
        let json = serde_json::json!({
            "pipelineId": "pl-9",
            "imageIds": ["a", "b"],
            "userId": "u-1",
            "metadata": { "libraryId": 7, "libraryName": "Field", "pipelineName": "Tagging" }
        });
        let parsed: JobPayload = serde_json::from_value(json).expect("valid payload");
        assert_eq!(parsed.image_ids, vec!["a", "b"]);
        assert_eq!(parsed.metadata.map(|m| m.library_id), Some(7));
    }

    #[test]
    fn test_can_retry_requires_failed_and_budget() {
        let mut job = JobRecord::new(JobId::new(), payload(), 2);
        assert!(!job.can_retry());

        job.status = JobStatus::Failed;
        job.attempts = 1;
        assert!(job.can_retry());

        job.attempts = 2;
        assert!(!job.can_retry());
    }
}
