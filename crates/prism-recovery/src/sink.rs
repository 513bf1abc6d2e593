//! Durable storage seam for classified errors.

use async_trait::async_trait;
use dashmap::DashMap;

use prism_core::error::AppError;
use prism_core::result::AppResult;
use prism_core::types::{ErrorRecordId, JobId};
use prism_entity::ErrorRecord;

/// Where classified errors are persisted.
///
/// Implementations must be safe to call from many jobs at once. The
/// scheduler only ever calls [`ErrorLogSink::insert`]; the read and resolve
/// methods serve admin tooling and downstream aggregation.
#[async_trait]
pub trait ErrorLogSink: Send + Sync + std::fmt::Debug {
    /// Persist a new record.
    async fn insert(&self, record: &ErrorRecord) -> AppResult<()>;

    /// Find a record by id.
    async fn find_by_id(&self, id: ErrorRecordId) -> AppResult<Option<ErrorRecord>>;

    /// All records for a job, oldest first.
    async fn list_for_job(&self, job_id: JobId) -> AppResult<Vec<ErrorRecord>>;

    /// Most recent unresolved records, newest first.
    async fn list_unresolved(&self, limit: usize) -> AppResult<Vec<ErrorRecord>>;

    /// Mark a record resolved and return the updated record.
    async fn resolve(&self, id: ErrorRecordId, notes: Option<String>) -> AppResult<ErrorRecord>;
}

/// Process-local sink used when no database is configured.
#[derive(Debug, Default)]
pub struct InMemoryErrorLogSink {
    records: DashMap<ErrorRecordId, ErrorRecord>,
}

impl InMemoryErrorLogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ErrorLogSink for InMemoryErrorLogSink {
    async fn insert(&self, record: &ErrorRecord) -> AppResult<()> {
        if self.records.contains_key(&record.id) {
            return Err(AppError::conflict(format!(
                "Error record {} already exists",
                record.id
            )));
        }
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ErrorRecordId) -> AppResult<Option<ErrorRecord>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn list_for_job(&self, job_id: JobId) -> AppResult<Vec<ErrorRecord>> {
        let mut records: Vec<ErrorRecord> = self
            .records
            .iter()
            .filter(|r| r.job_id == job_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn list_unresolved(&self, limit: usize) -> AppResult<Vec<ErrorRecord>> {
        let mut records: Vec<ErrorRecord> = self
            .records
            .iter()
            .filter(|r| !r.resolved)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn resolve(&self, id: ErrorRecordId, notes: Option<String>) -> AppResult<ErrorRecord> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Error record {id} not found")))?;
        entry.resolve(notes);
        Ok(entry.value().clone())
    }
}
