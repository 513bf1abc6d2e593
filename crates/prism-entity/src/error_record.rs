//! Classified error records persisted through the error log sink.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prism_core::types::{ErrorRecordId, JobId};

/// Coarse error category used for analytics grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    RateLimit,
    Timeout,
    ImageSize,
    Authorization,
    Database,
    Network,
    Unknown,
}

impl ErrorType {
    /// Return the category as its snake_case storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::ImageSize => "image_size",
            Self::Authorization => "authorization",
            Self::Database => "database",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rate_limit" => Ok(Self::RateLimit),
            "timeout" => Ok(Self::Timeout),
            "image_size" => Ok(Self::ImageSize),
            "authorization" => Ok(Self::Authorization),
            "database" => Ok(Self::Database),
            "network" => Ok(Self::Network),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown error type '{other}'")),
        }
    }
}

/// One classified failure.
///
/// Created once per failure and only ever mutated by [`ErrorRecord::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: ErrorRecordId,
    pub job_id: JobId,
    /// Pipeline stage that failed, when known.
    pub stage_id: Option<String>,
    /// Image being processed, when known.
    pub image_id: Option<String>,
    pub error_type: ErrorType,
    /// Fine-grained taxonomy key such as `RATE_LIMIT_EXCEEDED`.
    pub error_code: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    /// Free-form context (attempt numbers, pipeline, library, recovery action).
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

impl ErrorRecord {
    /// Mark the record resolved. Resolving twice keeps the first timestamp.
    pub fn resolve(&mut self, notes: Option<String>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(Utc::now());
        }
        if notes.is_some() {
            self.resolution_notes = notes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_parses_storage_names() {
        for ty in [
            ErrorType::RateLimit,
            ErrorType::Timeout,
            ErrorType::ImageSize,
            ErrorType::Authorization,
            ErrorType::Database,
            ErrorType::Network,
            ErrorType::Unknown,
        ] {
            assert_eq!(ty.as_str().parse::<ErrorType>(), Ok(ty));
        }
        assert!("quota".parse::<ErrorType>().is_err());
    }

    #[test]
    fn test_resolve_sets_timestamp_once() {
        let mut record = ErrorRecord {
            id: ErrorRecordId::new(),
            job_id: JobId::new(),
            stage_id: None,
            image_id: None,
            error_type: ErrorType::Database,
            error_code: "DATABASE_ERROR".to_string(),
            error_message: "database is locked".to_string(),
            stack_trace: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
            resolution_notes: None,
        };

        record.resolve(Some("restarted replica".to_string()));
        let first = record.resolved_at;
        assert!(record.resolved);
        assert!(first.is_some());

        record.resolve(None);
        assert_eq!(record.resolved_at, first);
        assert_eq!(
            record.resolution_notes.as_deref(),
            Some("restarted replica")
        );
    }
}
