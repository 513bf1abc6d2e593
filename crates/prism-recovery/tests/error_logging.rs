//! Error logging behaviour against failing collaborators.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use prism_core::error::AppError;
use prism_core::result::AppResult;
use prism_core::types::{ErrorRecordId, JobId};
use prism_entity::{ErrorRecord, ErrorType};
use prism_recovery::codes;
use prism_recovery::{AlertNotifier, CriticalAlert, ErrorContext, ErrorLogSink, ErrorLogger};

#[derive(Debug)]
struct UnreachableSink;

#[async_trait]
impl ErrorLogSink for UnreachableSink {
    async fn insert(&self, _record: &ErrorRecord) -> AppResult<()> {
        Err(AppError::database("connection refused"))
    }

    async fn find_by_id(&self, _id: ErrorRecordId) -> AppResult<Option<ErrorRecord>> {
        Err(AppError::database("connection refused"))
    }

    async fn list_for_job(&self, _job_id: JobId) -> AppResult<Vec<ErrorRecord>> {
        Err(AppError::database("connection refused"))
    }

    async fn list_unresolved(&self, _limit: usize) -> AppResult<Vec<ErrorRecord>> {
        Err(AppError::database("connection refused"))
    }

    async fn resolve(&self, _id: ErrorRecordId, _notes: Option<String>) -> AppResult<ErrorRecord> {
        Err(AppError::database("connection refused"))
    }
}

#[derive(Debug, Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<CriticalAlert>>,
    fail: bool,
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &CriticalAlert) -> AppResult<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail {
            return Err(AppError::service_unavailable("pager offline"));
        }
        Ok(())
    }
}

#[tokio::test]
async fn unreachable_sink_returns_no_id() {
    let logger = ErrorLogger::new(Arc::new(UnreachableSink), None);

    let id = logger
        .log_error(JobId::new(), "database connection lost", ErrorContext::new())
        .await;

    assert!(id.is_none());
}

#[tokio::test]
async fn critical_alert_is_raised_even_when_persistence_fails() {
    let notifier = Arc::new(RecordingNotifier::default());
    let logger = ErrorLogger::new(Arc::new(UnreachableSink), Some(notifier.clone()));
    let job_id = JobId::new();

    let logged = logger
        .record(job_id, "DATABASE_ERROR: deadlock detected", ErrorContext::new())
        .await;

    assert_eq!(logged.error_code, codes::DATABASE_ERROR);
    assert_eq!(logged.error_type, ErrorType::Database);
    assert!(logged.critical);
    assert!(logged.record_id.is_none());

    let alerts = notifier.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].job_id, job_id);
    assert!(alerts[0].record_id.is_none());
}

#[tokio::test]
async fn alert_failure_does_not_propagate() {
    let notifier = Arc::new(RecordingNotifier {
        alerts: Mutex::new(Vec::new()),
        fail: true,
    });
    let sink = Arc::new(prism_recovery::InMemoryErrorLogSink::new());
    let logger = ErrorLogger::new(sink.clone(), Some(notifier.clone()));

    let id = logger
        .log_error(
            JobId::new(),
            "quota exhausted",
            ErrorContext::new().with_error_code(codes::API_QUOTA_EXCEEDED),
        )
        .await;

    assert!(id.is_some());
    assert_eq!(sink.len(), 1);
    assert_eq!(notifier.alerts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn non_critical_codes_raise_no_alert() {
    let notifier = Arc::new(RecordingNotifier::default());
    let sink = Arc::new(prism_recovery::InMemoryErrorLogSink::new());
    let logger = ErrorLogger::new(sink, Some(notifier.clone()));

    logger
        .log_error(JobId::new(), "429 rate limit", ErrorContext::new())
        .await;

    assert!(notifier.alerts.lock().unwrap().is_empty());
}
