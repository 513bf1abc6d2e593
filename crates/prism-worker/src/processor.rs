//! The processor seam: what the scheduler invokes for each attempt.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use prism_core::error::AppError;
use prism_core::types::JobId;
use prism_entity::{ErrorType, JobRecord};
use prism_recovery::{ErrorContext, ErrorLogger};

use crate::scheduler::Scheduler;

/// Runs one attempt of a job.
///
/// An `Err` sends the job through classification and the retry decision.
/// The processor is never cancelled once started.
#[async_trait]
pub trait JobProcessor: Send + Sync + fmt::Debug {
    async fn process(&self, job: &JobRecord, ctx: &JobContext) -> Result<(), ProcessorError>;
}

/// Failure reported by a processor.
///
/// `error_code` and `error_type`, when set, override what the classifier
/// would infer from `message`. Configuration errors such as
/// `INVALID_PIPELINE` are only ever recognized this way.
#[derive(Debug, Clone, Default, thiserror::Error)]
#[error("{message}")]
pub struct ProcessorError {
    pub message: String,
    pub error_code: Option<String>,
    pub error_type: Option<ErrorType>,
    pub stage_id: Option<String>,
    pub image_id: Option<String>,
    pub stack_trace: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Split into the message and the logging context.
    pub fn into_context(self) -> (String, ErrorContext) {
        let context = ErrorContext {
            stage_id: self.stage_id,
            image_id: self.image_id,
            error_type: self.error_type,
            error_code: self.error_code,
            stack_trace: self.stack_trace,
            metadata: self.metadata,
        };
        (self.message, context)
    }
}

impl From<AppError> for ProcessorError {
    fn from(err: AppError) -> Self {
        Self::new(err.to_string())
    }
}

/// Handle given to a processor for the duration of one attempt.
#[derive(Clone)]
pub struct JobContext {
    job_id: JobId,
    attempt: u32,
    scheduler: Scheduler,
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("attempt", &self.attempt)
            .finish()
    }
}

impl JobContext {
    pub(crate) fn new(job: &JobRecord, scheduler: Scheduler) -> Self {
        Self {
            job_id: job.id,
            attempt: job.attempts,
            scheduler,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// 1-based attempt number of this run.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Report progress; values are clamped to 0..=100.
    pub async fn report_progress(&self, percent: i64) {
        self.scheduler.update_progress(self.job_id, percent).await;
    }

    /// Logger for failures the processor handles itself (skipped images).
    pub fn error_logger(&self) -> &ErrorLogger {
        self.scheduler.error_logger()
    }
}

/// Adapter that turns an async closure into a [`JobProcessor`].
pub struct FnProcessor<F> {
    f: F,
}

impl<F> fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcessor").finish()
    }
}

#[async_trait]
impl<F, Fut> JobProcessor for FnProcessor<F>
where
    F: Fn(JobRecord, JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessorError>> + Send + 'static,
{
    async fn process(&self, job: &JobRecord, ctx: &JobContext) -> Result<(), ProcessorError> {
        (self.f)(job.clone(), ctx.clone()).await
    }
}

/// Wrap an async closure as a shareable processor.
pub fn processor_fn<F, Fut>(f: F) -> Arc<dyn JobProcessor>
where
    F: Fn(JobRecord, JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessorError>> + Send + 'static,
{
    Arc::new(FnProcessor { f })
}
