//! Job scheduler: submission, FIFO dispatch under a concurrency ceiling,
//! and the failure path that decides between retry and terminal failure.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify, RwLock, broadcast, watch};
use tracing::{debug, error, info, warn};

use prism_core::config::scheduler::SchedulerConfig;
use prism_core::error::AppError;
use prism_core::result::AppResult;
use prism_core::types::JobId;
use prism_entity::{JobPayload, JobRecord, JobStats, JobStatus, RecoveryKind};
use prism_recovery::{ErrorLogger, get_user_friendly_message};

use crate::events::JobEvent;
use crate::processor::{JobContext, JobProcessor, ProcessorError};
use crate::store::{FailureOutcome, JobStore};

/// Per-submission overrides.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Caller-supplied id; generated when absent.
    pub job_id: Option<JobId>,
    /// Attempt budget; the scheduler default when absent.
    pub max_attempts: Option<u32>,
}

struct Inner {
    store: Mutex<JobStore>,
    processor: RwLock<Option<Arc<dyn JobProcessor>>>,
    concurrency: AtomicUsize,
    default_max_attempts: u32,
    dispatch_started: AtomicBool,
    /// Woken on submit, retry, and whenever a slot frees up.
    wake: Notify,
    /// Woken whenever the store may have become idle.
    idle: Notify,
    events: broadcast::Sender<JobEvent>,
    shutdown: watch::Sender<bool>,
    logger: ErrorLogger,
}

/// Single scheduling authority for a process.
///
/// Cheap to clone; all clones share the same job store. Dispatch starts
/// with the first [`Scheduler::register_processor`] call.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("concurrency", &self.concurrency_limit())
            .field("default_max_attempts", &self.inner.default_max_attempts)
            .field("store", &"<Mutex<JobStore>>")
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler. Nothing is dispatched until a processor is registered.
    pub fn new(config: &SchedulerConfig, logger: ErrorLogger) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer_size.max(1));
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(JobStore::default()),
                processor: RwLock::new(None),
                concurrency: AtomicUsize::new(config.concurrency.max(1)),
                default_max_attempts: config.default_max_attempts.max(1),
                dispatch_started: AtomicBool::new(false),
                wake: Notify::new(),
                idle: Notify::new(),
                events,
                shutdown,
                logger,
            }),
        }
    }

    /// Submit a job with a generated id and the default attempt budget.
    pub async fn submit(&self, payload: JobPayload) -> AppResult<JobRecord> {
        self.submit_with(payload, SubmitOptions::default()).await
    }

    /// Submit a job. Never waits for capacity.
    pub async fn submit_with(
        &self,
        payload: JobPayload,
        options: SubmitOptions,
    ) -> AppResult<JobRecord> {
        if payload.pipeline_id.trim().is_empty() {
            return Err(AppError::validation("pipelineId must not be empty"));
        }
        if payload.user_id.trim().is_empty() {
            return Err(AppError::validation("userId must not be empty"));
        }
        let max_attempts = options.max_attempts.unwrap_or(self.inner.default_max_attempts);
        if max_attempts == 0 {
            return Err(AppError::validation("maxAttempts must be at least 1"));
        }

        let job = JobRecord::new(options.job_id.unwrap_or_default(), payload, max_attempts);
        let job = {
            let mut store = self.inner.store.lock().await;
            let job = store.insert(job)?;
            self.emit(JobEvent::Waiting { job_id: job.id });
            job
        };

        debug!(
            job_id = %job.id,
            pipeline_id = %job.payload.pipeline_id,
            images = job.payload.image_ids.len(),
            max_attempts = job.max_attempts,
            "Job submitted"
        );
        self.inner.wake.notify_one();
        Ok(job)
    }

    /// Register the processor and concurrency ceiling, starting dispatch on
    /// first call. Later calls replace both without a second loop.
    pub async fn register_processor(
        &self,
        concurrency_limit: usize,
        processor: Arc<dyn JobProcessor>,
    ) -> AppResult<()> {
        if concurrency_limit == 0 {
            return Err(AppError::validation("concurrency limit must be at least 1"));
        }

        *self.inner.processor.write().await = Some(processor);
        self.inner
            .concurrency
            .store(concurrency_limit, Ordering::SeqCst);

        if !self.inner.dispatch_started.swap(true, Ordering::SeqCst) {
            info!(concurrency = concurrency_limit, "Starting job dispatch loop");
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.dispatch_loop().await;
            });
        } else {
            info!(concurrency = concurrency_limit, "Replaced job processor");
        }

        self.inner.wake.notify_one();
        Ok(())
    }

    /// Cancel a waiting job. Returns `None` (no effect) for any other status.
    pub async fn cancel(&self, job_id: JobId) -> Option<JobRecord> {
        let cancelled = {
            let mut store = self.inner.store.lock().await;
            let job = store.cancel(job_id)?;
            self.emit(JobEvent::Failed {
                job: job.clone(),
                error: job.error.clone().unwrap_or_default(),
            });
            self.notify_if_idle(&store);
            job
        };

        info!(job_id = %job_id, "Job cancelled");
        Some(cancelled)
    }

    /// Re-enqueue a failed job with attempts left. Returns `None` (no
    /// effect) otherwise.
    pub async fn retry(&self, job_id: JobId) -> Option<JobRecord> {
        let retried = {
            let mut store = self.inner.store.lock().await;
            let job = store.retry(job_id)?;
            self.emit(JobEvent::Waiting { job_id });
            job
        };

        info!(
            job_id = %job_id,
            attempts = retried.attempts,
            max_attempts = retried.max_attempts,
            "Job manually retried"
        );
        self.inner.wake.notify_one();
        Some(retried)
    }

    /// Set the progress of an active job. Ignored for other statuses.
    pub async fn update_progress(&self, job_id: JobId, percent: i64) -> Option<JobRecord> {
        let mut store = self.inner.store.lock().await;
        let job = store.set_progress(job_id, percent)?;
        self.emit(JobEvent::Progress {
            percent: job.progress,
            job: job.clone(),
        });
        Some(job)
    }

    /// Job counts by status.
    pub async fn get_stats(&self) -> JobStats {
        self.inner.store.lock().await.stats()
    }

    pub async fn get_job(&self, job_id: JobId) -> Option<JobRecord> {
        self.inner.store.lock().await.get(job_id).cloned()
    }

    /// Jobs in submission order, optionally filtered by status.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        self.inner.store.lock().await.list(status)
    }

    /// Subscribe to lifecycle events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// The logger used on the failure path.
    pub fn error_logger(&self) -> &ErrorLogger {
        &self.inner.logger
    }

    pub fn concurrency_limit(&self) -> usize {
        self.inner.concurrency.load(Ordering::SeqCst)
    }

    /// Resolve once no job is waiting or active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.store.lock().await.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop dispatching. Active jobs run to completion; waiting jobs stay queued.
    pub fn shutdown(&self) {
        info!("Job dispatch shutting down");
        self.inner.shutdown.send_replace(true);
    }

    async fn dispatch_loop(self) {
        let mut shutdown = self.inner.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let processor = self.inner.processor.read().await.clone();
            let next = match processor {
                Some(processor) => {
                    let limit = self.concurrency_limit();
                    let mut store = self.inner.store.lock().await;
                    store.dispatch_next(limit).map(|job| {
                        self.emit(JobEvent::Active { job: job.clone() });
                        (job, processor)
                    })
                }
                None => None,
            };

            match next {
                Some((job, processor)) => {
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        scheduler.run_job(job, processor).await;
                    });
                }
                None => {
                    tokio::select! {
                        _ = self.inner.wake.notified() => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!("Job dispatch loop stopped");
    }

    async fn run_job(&self, job: JobRecord, processor: Arc<dyn JobProcessor>) {
        info!(
            job_id = %job.id,
            pipeline_id = %job.payload.pipeline_id,
            "Processing job: attempt {}/{}",
            job.attempts,
            job.max_attempts
        );

        let ctx = JobContext::new(&job, self.clone());
        let attempt_job = job.clone();
        let handle = tokio::spawn(async move { processor.process(&attempt_job, &ctx).await });

        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(ProcessorError::new(format!(
                "processor aborted: {join_error}"
            ))),
        };

        match result {
            Ok(()) => self.finish_success(job.id).await,
            Err(err) => self.finish_failure(&job, err).await,
        }
    }

    async fn finish_success(&self, job_id: JobId) {
        {
            let mut store = self.inner.store.lock().await;
            if let Some(job) = store.complete(job_id) {
                self.emit(JobEvent::Completed { job });
            }
            self.notify_if_idle(&store);
        }

        info!(job_id = %job_id, "Job completed successfully");
        self.inner.wake.notify_one();
    }

    async fn finish_failure(&self, job: &JobRecord, err: ProcessorError) {
        let (message, mut context) = err.into_context();
        context
            .metadata
            .insert("attempt".to_string(), job.attempts.into());
        context
            .metadata
            .insert("max_attempts".to_string(), job.max_attempts.into());
        context.metadata.insert(
            "pipeline_id".to_string(),
            job.payload.pipeline_id.clone().into(),
        );
        context
            .metadata
            .insert("user_id".to_string(), job.payload.user_id.clone().into());
        if let Some(meta) = &job.payload.metadata {
            context
                .metadata
                .insert("library_id".to_string(), meta.library_id.into());
        }

        let logged = self.inner.logger.record(job.id, &message, context).await;
        let action = logged.recovery.map(|r| r.action);
        let requeue = action != Some(RecoveryKind::ManualReview);
        let friendly = get_user_friendly_message(&logged.error_code, Some(&message));

        let outcome = {
            let mut store = self.inner.store.lock().await;
            let outcome = store.fail_attempt(job.id, requeue, friendly);
            match &outcome {
                Some(FailureOutcome::Requeued(job)) => {
                    self.emit(JobEvent::Waiting { job_id: job.id });
                }
                Some(FailureOutcome::Failed(job)) => {
                    self.emit(JobEvent::Failed {
                        job: job.clone(),
                        error: job.error.clone().unwrap_or_default(),
                    });
                }
                None => {}
            }
            self.notify_if_idle(&store);
            outcome
        };

        match outcome {
            Some(FailureOutcome::Requeued(job)) => warn!(
                job_id = %job.id,
                error_code = %logged.error_code,
                recovery = ?action,
                "Job attempt {}/{} failed, re-enqueued: {}",
                job.attempts,
                job.max_attempts,
                message
            ),
            Some(FailureOutcome::Failed(job)) => error!(
                job_id = %job.id,
                error_code = %logged.error_code,
                error_type = %logged.error_type,
                recovery = ?action,
                "Job failed after {}/{} attempts: {}",
                job.attempts,
                job.max_attempts,
                message
            ),
            None => {}
        }

        self.inner.wake.notify_one();
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn notify_if_idle(&self, store: &JobStore) {
        if store.is_idle() {
            self.inner.idle.notify_waiters();
        }
    }
}
