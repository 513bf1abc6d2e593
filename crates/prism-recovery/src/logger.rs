//! Classifies failures, persists them, and raises critical alerts.
//!
//! Logging is best-effort: neither a sink failure nor an alert failure ever
//! reaches the caller.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use prism_core::result::AppResult;
use prism_core::types::{ErrorRecordId, JobId};
use prism_entity::{ErrorRecord, ErrorType, RecoveryAction};

use crate::alert::{AlertNotifier, CriticalAlert};
use crate::classifier::{categorize_error, extract_error_code};
use crate::policy::{get_recovery_action, is_critical_error};
use crate::sink::ErrorLogSink;

/// Caller-supplied context for a failure. Explicit `error_type` and
/// `error_code` take precedence over classification of the message.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub stage_id: Option<String>,
    pub image_id: Option<String>,
    pub error_type: Option<ErrorType>,
    pub error_code: Option<String>,
    pub stack_trace: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// Attach one metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of logging one failure.
#[derive(Debug, Clone)]
pub struct LoggedError {
    /// Persisted record id, `None` when the sink rejected the write.
    pub record_id: Option<ErrorRecordId>,
    pub error_type: ErrorType,
    pub error_code: String,
    pub recovery: Option<RecoveryAction>,
    pub critical: bool,
}

/// Error logging front end shared by the scheduler and processors.
#[derive(Debug, Clone)]
pub struct ErrorLogger {
    sink: Arc<dyn ErrorLogSink>,
    alerts: Option<Arc<dyn AlertNotifier>>,
}

impl ErrorLogger {
    /// Create a logger. Pass `None` for `alerts` to disable critical alerts.
    pub fn new(sink: Arc<dyn ErrorLogSink>, alerts: Option<Arc<dyn AlertNotifier>>) -> Self {
        Self { sink, alerts }
    }

    /// Log a failure and return the stored record id, if any.
    pub async fn log_error(
        &self,
        job_id: JobId,
        message: &str,
        context: ErrorContext,
    ) -> Option<ErrorRecordId> {
        self.record(job_id, message, context).await.record_id
    }

    /// Log a failure and return its full classification.
    pub async fn record(&self, job_id: JobId, message: &str, context: ErrorContext) -> LoggedError {
        let ErrorContext {
            stage_id,
            image_id,
            error_type,
            error_code,
            stack_trace,
            mut metadata,
        } = context;

        let error_type = error_type.unwrap_or_else(|| categorize_error(message));
        let error_code = error_code.unwrap_or_else(|| extract_error_code(message));
        let recovery = get_recovery_action(&error_code);
        let critical = is_critical_error(&error_code);

        if let Some(action) = recovery {
            metadata.insert(
                "recovery".to_string(),
                serde_json::to_value(action).unwrap_or(Value::Null),
            );
        }

        let record = ErrorRecord {
            id: ErrorRecordId::new(),
            job_id,
            stage_id,
            image_id,
            error_type,
            error_code: error_code.clone(),
            error_message: message.to_string(),
            stack_trace,
            metadata: Value::Object(metadata),
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
            resolution_notes: None,
        };

        let record_id = match self.sink.insert(&record).await {
            Ok(()) => {
                debug!(
                    job_id = %job_id,
                    record_id = %record.id,
                    error_type = %error_type,
                    error_code = %error_code,
                    "Logged job error"
                );
                Some(record.id)
            }
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    error_code = %error_code,
                    "Failed to persist job error: {}",
                    e
                );
                None
            }
        };

        if critical {
            self.raise_alert(job_id, record_id, &error_code, message).await;
        }

        LoggedError {
            record_id,
            error_type,
            error_code,
            recovery,
            critical,
        }
    }

    /// Mark a stored error resolved. Has no effect on job state.
    pub async fn resolve_error(
        &self,
        id: ErrorRecordId,
        notes: Option<String>,
    ) -> AppResult<ErrorRecord> {
        self.sink.resolve(id, notes).await
    }

    async fn raise_alert(
        &self,
        job_id: JobId,
        record_id: Option<ErrorRecordId>,
        error_code: &str,
        message: &str,
    ) {
        let Some(alerts) = &self.alerts else {
            return;
        };

        let alert = CriticalAlert {
            job_id,
            record_id,
            error_code: error_code.to_string(),
            error_message: message.to_string(),
            raised_at: Utc::now(),
        };

        if let Err(e) = alerts.notify(&alert).await {
            warn!(
                job_id = %job_id,
                error_code = %error_code,
                "Failed to raise critical alert: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;
    use crate::sink::InMemoryErrorLogSink;

    #[tokio::test]
    async fn test_context_overrides_classification() {
        let sink = Arc::new(InMemoryErrorLogSink::new());
        let logger = ErrorLogger::new(sink.clone(), None);
        let job_id = JobId::new();

        let logged = logger
            .record(
                job_id,
                "INVALID_PIPELINE: missing stage",
                ErrorContext::new()
                    .with_error_code(codes::INVALID_PIPELINE)
                    .with_stage("stage-2"),
            )
            .await;

        assert_eq!(logged.error_code, codes::INVALID_PIPELINE);
        assert_eq!(logged.error_type, ErrorType::Unknown);
        assert!(logged.critical);

        let stored = sink
            .find_by_id(logged.record_id.expect("persisted"))
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(stored.stage_id.as_deref(), Some("stage-2"));
        assert_eq!(stored.metadata["recovery"]["action"], "manual_review");
    }

    #[tokio::test]
    async fn test_resolve_error_marks_record() {
        let sink = Arc::new(InMemoryErrorLogSink::new());
        let logger = ErrorLogger::new(sink.clone(), None);

        let id = logger
            .log_error(JobId::new(), "429 rate limit", ErrorContext::new())
            .await
            .expect("persisted");

        let resolved = logger
            .resolve_error(id, Some("quota raised".to_string()))
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert!(sink.list_unresolved(10).await.unwrap().is_empty());
    }
}
