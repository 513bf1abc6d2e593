//! Prism analysis job engine
//!
//! Reads job submissions as JSON lines from stdin, runs them through the
//! scheduler and the pipeline processor, and drains on shutdown.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use prism_core::config::AppConfig;
use prism_core::error::AppError;
use prism_core::types::JobId;
use prism_database::{DatabasePool, ErrorLogRepository};
use prism_entity::JobPayload;
use prism_recovery::{
    AlertNotifier, ErrorLogSink, ErrorLogger, InMemoryErrorLogSink, TracingAlertNotifier,
};
use prism_worker::jobs::{HttpStageRunner, PipelineJobProcessor};
use prism_worker::{JobEvent, Scheduler, SubmitOptions};

/// Prism analysis job engine
#[derive(Debug, Parser)]
#[command(name = "prism-engine", version, about, long_about = None)]
struct Args {
    /// Configuration file; defaults to config/default.toml plus the PRISM_ENV overlay
    #[arg(short, long)]
    config: Option<String>,

    /// Override scheduler.concurrency
    #[arg(long)]
    concurrency: Option<usize>,
}

/// One stdin line: a job payload plus optional submission overrides.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Submission {
    #[serde(flatten)]
    payload: JobPayload,
    #[serde(default)]
    job_id: Option<JobId>,
    #[serde(default)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_configuration(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Engine error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration(args: &Args) -> Result<AppConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => {
            let env = std::env::var("PRISM_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)?
        }
    };

    if let Some(concurrency) = args.concurrency {
        config.scheduler.concurrency = concurrency;
        config.validate()?;
    }

    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Prism engine v{}", env!("CARGO_PKG_VERSION"));

    // Error log sink
    let (sink, db_pool): (Arc<dyn ErrorLogSink>, Option<DatabasePool>) = match &config.database {
        Some(database) => {
            let pool = DatabasePool::connect(database).await?;
            prism_database::migration::run_migrations(pool.pool()).await?;
            let repo: Arc<dyn ErrorLogSink> =
                Arc::new(ErrorLogRepository::new(pool.pool().clone()));
            (repo, Some(pool))
        }
        None => {
            tracing::warn!("No database configured, error records are kept in memory");
            let memory: Arc<dyn ErrorLogSink> = Arc::new(InMemoryErrorLogSink::new());
            (memory, None)
        }
    };

    let alerts: Option<Arc<dyn AlertNotifier>> = if config.alerts.enabled {
        Some(Arc::new(TracingAlertNotifier))
    } else {
        None
    };
    let logger = ErrorLogger::new(sink, alerts);

    // Scheduler and processor
    let scheduler = Scheduler::new(&config.scheduler, logger);
    let runner = HttpStageRunner::new(&config.stages)?;
    tracing::info!(base_url = %runner.base_url(), "Using analysis stage service");
    let processor =
        PipelineJobProcessor::new(Arc::new(runner), config.stages.skip_defective_images);
    scheduler
        .register_processor(config.scheduler.concurrency, Arc::new(processor))
        .await?;

    let events_handle = tokio::spawn(log_events(scheduler.clone()));

    // Submissions until stdin closes or a signal arrives
    tokio::select! {
        result = read_submissions(&scheduler) => {
            result?;
            tracing::info!("Input closed, waiting for queued jobs");
            tokio::select! {
                _ = scheduler.wait_idle() => {}
                _ = shutdown_signal() => {
                    tracing::info!("Shutdown signal received, starting graceful shutdown...");
                }
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        }
    }

    scheduler.shutdown();
    let grace = Duration::from_secs(config.scheduler.shutdown_grace_seconds);
    if tokio::time::timeout(grace, drain_active(&scheduler)).await.is_err() {
        tracing::warn!("Shutdown grace period elapsed with jobs still active");
    }

    let stats = scheduler.get_stats().await;
    tracing::info!(
        waiting = stats.waiting,
        active = stats.active,
        completed = stats.completed,
        failed = stats.failed,
        "Final job statistics"
    );

    events_handle.abort();
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("Prism engine shut down gracefully");
    Ok(())
}

/// Submit one job per non-empty stdin line.
async fn read_submissions(scheduler: &Scheduler) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let submission: Submission = match serde_json::from_str(line) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Ignoring malformed submission: {}", e);
                continue;
            }
        };

        let options = SubmitOptions {
            job_id: submission.job_id,
            max_attempts: submission.max_attempts,
        };
        match scheduler.submit_with(submission.payload, options).await {
            Ok(job) => tracing::info!(job_id = %job.id, "Job queued"),
            Err(e) => tracing::warn!("Submission rejected: {}", e),
        }
    }

    Ok(())
}

/// Log lifecycle events until the channel closes.
async fn log_events(scheduler: Scheduler) {
    let mut events = scheduler.subscribe();
    loop {
        match events.recv().await {
            Ok(JobEvent::Progress { job, percent }) => {
                tracing::debug!(job_id = %job.id, percent, "Job progress");
            }
            Ok(JobEvent::Failed { job, error }) => {
                tracing::warn!(job_id = %job.id, attempts = job.attempts, "Job failed: {}", error);
            }
            Ok(event) => {
                tracing::info!(job_id = %event.job_id(), event = event.kind(), "Job event");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event listener lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Wait until no job is active.
async fn drain_active(scheduler: &Scheduler) {
    while scheduler.get_stats().await.active > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
