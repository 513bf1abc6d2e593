//! Error log repository backed by the `analysis_errors` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use prism_core::error::{AppError, ErrorKind};
use prism_core::result::AppResult;
use prism_core::types::{ErrorRecordId, JobId};
use prism_entity::{ErrorRecord, ErrorType};
use prism_recovery::ErrorLogSink;

const COLUMNS: &str = "id, job_id, stage_id, image_id, error_type, error_code, error_message, \
     stack_trace, metadata, created_at, resolved, resolved_at, resolution_notes";

/// Row shape of `analysis_errors`; `error_type` is stored as its snake_case name.
#[derive(Debug, sqlx::FromRow)]
struct ErrorRow {
    id: ErrorRecordId,
    job_id: JobId,
    stage_id: Option<String>,
    image_id: Option<String>,
    error_type: String,
    error_code: String,
    error_message: String,
    stack_trace: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
    resolution_notes: Option<String>,
}

impl From<ErrorRow> for ErrorRecord {
    fn from(row: ErrorRow) -> Self {
        Self {
            id: row.id,
            job_id: row.job_id,
            stage_id: row.stage_id,
            image_id: row.image_id,
            error_type: row.error_type.parse().unwrap_or(ErrorType::Unknown),
            error_code: row.error_code,
            error_message: row.error_message,
            stack_trace: row.stack_trace,
            metadata: row.metadata,
            created_at: row.created_at,
            resolved: row.resolved,
            resolved_at: row.resolved_at,
            resolution_notes: row.resolution_notes,
        }
    }
}

/// Persistent error log sink.
#[derive(Debug, Clone)]
pub struct ErrorLogRepository {
    pool: PgPool,
}

impl ErrorLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count errors per code, most frequent first.
    pub async fn count_by_code(&self) -> AppResult<Vec<(String, i64)>> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT error_code, COUNT(*) FROM analysis_errors \
             GROUP BY error_code ORDER BY COUNT(*) DESC, error_code",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count errors", e))
    }
}

#[async_trait]
impl ErrorLogSink for ErrorLogRepository {
    async fn insert(&self, record: &ErrorRecord) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO analysis_errors ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(record.id)
        .bind(record.job_id)
        .bind(&record.stage_id)
        .bind(&record.image_id)
        .bind(record.error_type.as_str())
        .bind(&record.error_code)
        .bind(&record.error_message)
        .bind(&record.stack_trace)
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.resolved)
        .bind(record.resolved_at)
        .bind(&record.resolution_notes)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to insert error record", e)
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: ErrorRecordId) -> AppResult<Option<ErrorRecord>> {
        let row = sqlx::query_as::<_, ErrorRow>(&format!(
            "SELECT {COLUMNS} FROM analysis_errors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find error record", e))?;
        Ok(row.map(ErrorRecord::from))
    }

    async fn list_for_job(&self, job_id: JobId) -> AppResult<Vec<ErrorRecord>> {
        let rows = sqlx::query_as::<_, ErrorRow>(&format!(
            "SELECT {COLUMNS} FROM analysis_errors WHERE job_id = $1 ORDER BY created_at ASC"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list job errors", e))?;
        Ok(rows.into_iter().map(ErrorRecord::from).collect())
    }

    async fn list_unresolved(&self, limit: usize) -> AppResult<Vec<ErrorRecord>> {
        let rows = sqlx::query_as::<_, ErrorRow>(&format!(
            "SELECT {COLUMNS} FROM analysis_errors WHERE resolved = FALSE \
             ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list unresolved errors", e)
        })?;
        Ok(rows.into_iter().map(ErrorRecord::from).collect())
    }

    async fn resolve(&self, id: ErrorRecordId, notes: Option<String>) -> AppResult<ErrorRecord> {
        let row = sqlx::query_as::<_, ErrorRow>(&format!(
            "UPDATE analysis_errors SET resolved = TRUE, \
             resolved_at = COALESCE(resolved_at, NOW()), \
             resolution_notes = COALESCE($2, resolution_notes) \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to resolve error record", e)
        })?;

        row.map(ErrorRecord::from)
            .ok_or_else(|| AppError::not_found(format!("Error record {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(error_type: &str) -> ErrorRow {
        ErrorRow {
            id: ErrorRecordId::new(),
            job_id: JobId::new(),
            stage_id: Some("detect".to_string()),
            image_id: None,
            error_type: error_type.to_string(),
            error_code: "API_TIMEOUT".to_string(),
            error_message: "upstream timeout".to_string(),
            stack_trace: None,
            metadata: serde_json::json!({ "attempt": 1 }),
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
            resolution_notes: None,
        }
    }

    #[test]
    fn test_row_maps_error_type() {
        let record = ErrorRecord::from(row("timeout"));
        assert_eq!(record.error_type, ErrorType::Timeout);
        assert_eq!(record.stage_id.as_deref(), Some("detect"));
        assert_eq!(record.metadata["attempt"], 1);
    }

    #[test]
    fn test_unrecognized_error_type_reads_as_unknown() {
        let record = ErrorRecord::from(row("quota"));
        assert_eq!(record.error_type, ErrorType::Unknown);
    }
}
