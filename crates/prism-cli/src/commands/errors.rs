//! Error log CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use prism_core::error::AppError;
use prism_core::types::{ErrorRecordId, JobId};
use prism_database::ErrorLogRepository;
use prism_entity::ErrorRecord;
use prism_recovery::{ErrorLogSink, ErrorLogger};

use crate::output::{self, OutputFormat};

/// Arguments for error log commands
#[derive(Debug, Args)]
pub struct ErrorsArgs {
    /// Errors subcommand
    #[command(subcommand)]
    pub command: ErrorsCommand,
}

/// Error log subcommands
#[derive(Debug, Subcommand)]
pub enum ErrorsCommand {
    /// List errors of one job, or the newest unresolved errors
    List {
        /// Only errors of this job
        #[arg(short, long)]
        job: Option<String>,
        /// Maximum number of unresolved errors to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Mark an error resolved
    Resolve {
        /// Error record ID
        id: String,
        /// Resolution notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Error counts per code
    Stats,
}

/// Error display row
#[derive(Debug, Serialize, Tabled)]
struct ErrorRow {
    /// Record ID
    id: String,
    /// Time
    time: String,
    /// Job ID
    job: String,
    /// Error code
    code: String,
    /// Stage / image
    location: String,
    /// Resolved
    resolved: bool,
    /// Message
    message: String,
}

impl From<&ErrorRecord> for ErrorRow {
    fn from(record: &ErrorRecord) -> Self {
        let location = match (&record.stage_id, &record.image_id) {
            (Some(stage), Some(image)) => format!("{stage} / {image}"),
            (Some(stage), None) => stage.clone(),
            (None, Some(image)) => image.clone(),
            (None, None) => "-".to_string(),
        };

        Self {
            id: record.id.to_string(),
            time: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            job: record.job_id.to_string()[..8].to_string(),
            code: record.error_code.clone(),
            location,
            resolved: record.resolved,
            message: truncate(&record.error_message, 60),
        }
    }
}

/// Code count row
#[derive(Debug, Serialize, Tabled)]
struct CodeCountRow {
    /// Error code
    code: String,
    /// Occurrences
    count: i64,
}

/// Execute error log commands
pub async fn execute(
    args: &ErrorsArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::connect_database(&config).await?;
    let repo = ErrorLogRepository::new(pool.pool().clone());

    match &args.command {
        ErrorsCommand::List { job, limit } => {
            let records = match job {
                Some(job) => repo.list_for_job(parse_id::<JobId>(job, "job")?).await?,
                None => repo.list_unresolved(*limit).await?,
            };
            let rows: Vec<ErrorRow> = records.iter().map(ErrorRow::from).collect();
            output::print_list(&rows, format);
        }
        ErrorsCommand::Resolve { id, notes } => {
            let logger = ErrorLogger::new(std::sync::Arc::new(repo), None);
            let record = logger
                .resolve_error(parse_id::<ErrorRecordId>(id, "error record")?, notes.clone())
                .await?;
            output::print_success(&format!("Error {} resolved", record.id));
            if let Some(at) = record.resolved_at {
                output::print_kv("Resolved at", &at.to_rfc3339());
            }
        }
        ErrorsCommand::Stats => {
            let rows: Vec<CodeCountRow> = repo
                .count_by_code()
                .await?
                .into_iter()
                .map(|(code, count)| CodeCountRow { code, count })
                .collect();
            output::print_list(&rows, format);
        }
    }

    pool.close().await;
    Ok(())
}

fn parse_id<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid {what} ID '{value}': {e}")))
}

fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }
    let cut: String = message.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
