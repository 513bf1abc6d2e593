//! Out-of-band alerts for critical error codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prism_core::result::AppResult;
use prism_core::types::{ErrorRecordId, JobId};

/// Payload of a critical alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalAlert {
    pub job_id: JobId,
    /// Persisted record, absent when persistence failed.
    pub record_id: Option<ErrorRecordId>,
    pub error_code: String,
    pub error_message: String,
    pub raised_at: DateTime<Utc>,
}

/// Delivers critical alerts. Failures are logged by the caller, never raised.
#[async_trait]
pub trait AlertNotifier: Send + Sync + std::fmt::Debug {
    async fn notify(&self, alert: &CriticalAlert) -> AppResult<()>;
}

/// Emits alerts as `error!` events on the `prism::alert` target.
#[derive(Debug, Default, Clone)]
pub struct TracingAlertNotifier;

#[async_trait]
impl AlertNotifier for TracingAlertNotifier {
    async fn notify(&self, alert: &CriticalAlert) -> AppResult<()> {
        tracing::error!(
            target: "prism::alert",
            job_id = %alert.job_id,
            record_id = ?alert.record_id,
            error_code = %alert.error_code,
            "Critical error: {}",
            alert.error_message
        );
        Ok(())
    }
}
