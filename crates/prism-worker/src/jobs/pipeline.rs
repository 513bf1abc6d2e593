//! Runs every stage of a pipeline over every image of a job.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use prism_core::types::JobId;
use prism_entity::{JobRecord, RecoveryKind};
use prism_recovery::codes;
use prism_recovery::{extract_error_code, get_recovery_action};

use crate::processor::{JobContext, JobProcessor, ProcessorError};

/// Trait for stage execution. Decouples the processor from the analysis backend.
#[async_trait]
pub trait StageRunner: Send + Sync + fmt::Debug {
    /// Ordered stage ids of a pipeline.
    async fn stages(&self, pipeline_id: &str) -> Result<Vec<String>, ProcessorError>;

    /// Run one stage over one image.
    async fn run_stage(
        &self,
        job_id: JobId,
        pipeline_id: &str,
        stage_id: &str,
        image_id: &str,
    ) -> Result<(), ProcessorError>;
}

/// Processes analysis jobs image by image, stage by stage.
///
/// With `skip_defective_images`, an image whose failure maps to the `skip`
/// recovery action is logged and passed over instead of failing the job.
#[derive(Debug)]
pub struct PipelineJobProcessor {
    runner: Arc<dyn StageRunner>,
    skip_defective_images: bool,
}

impl PipelineJobProcessor {
    pub fn new(runner: Arc<dyn StageRunner>, skip_defective_images: bool) -> Self {
        Self {
            runner,
            skip_defective_images,
        }
    }

    fn is_skippable(&self, err: &ProcessorError) -> bool {
        if !self.skip_defective_images {
            return false;
        }
        let code = err
            .error_code
            .clone()
            .unwrap_or_else(|| extract_error_code(&err.message));
        get_recovery_action(&code).is_some_and(|r| r.action == RecoveryKind::Skip)
    }
}

#[async_trait]
impl JobProcessor for PipelineJobProcessor {
    async fn process(&self, job: &JobRecord, ctx: &JobContext) -> Result<(), ProcessorError> {
        let pipeline_id = job.payload.pipeline_id.as_str();
        let images = &job.payload.image_ids;
        if images.is_empty() {
            return Ok(());
        }

        let stages = self.runner.stages(pipeline_id).await?;
        if stages.is_empty() {
            return Err(
                ProcessorError::new(format!("Pipeline {} has no stages", pipeline_id))
                    .with_code(codes::INVALID_PIPELINE),
            );
        }

        let total = images.len() * stages.len();
        let mut done = 0usize;
        let mut skipped = 0usize;

        for image_id in images {
            for (index, stage_id) in stages.iter().enumerate() {
                let result = self
                    .runner
                    .run_stage(job.id, pipeline_id, stage_id, image_id)
                    .await;

                if let Err(mut err) = result {
                    if err.stage_id.is_none() {
                        err.stage_id = Some(stage_id.clone());
                    }
                    if err.image_id.is_none() {
                        err.image_id = Some(image_id.clone());
                    }

                    if !self.is_skippable(&err) {
                        return Err(err);
                    }

                    warn!(
                        job_id = %job.id,
                        image_id = %image_id,
                        stage_id = %stage_id,
                        "Skipping image: {}",
                        err.message
                    );
                    let (message, context) = err.into_context();
                    ctx.error_logger()
                        .log_error(job.id, &message, context.with_meta("skipped", true))
                        .await;

                    skipped += 1;
                    done += stages.len() - index;
                    ctx.report_progress(percent(done, total)).await;
                    break;
                }

                done += 1;
                ctx.report_progress(percent(done, total)).await;
            }
        }

        info!(
            job_id = %job.id,
            pipeline_id = %pipeline_id,
            images = images.len(),
            skipped,
            "Pipeline run finished"
        );
        Ok(())
    }
}

fn percent(done: usize, total: usize) -> i64 {
    (done * 100 / total.max(1)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoStages;

    #[async_trait]
    impl StageRunner for NoStages {
        async fn stages(&self, _: &str) -> Result<Vec<String>, ProcessorError> {
            Ok(Vec::new())
        }

        async fn run_stage(
            &self,
            _: JobId,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<(), ProcessorError> {
            Ok(())
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn test_skippable_codes() {
        let processor = PipelineJobProcessor::new(Arc::new(NoStages), true);
        let corrupted = ProcessorError::new("bad header").with_code(codes::IMAGE_CORRUPTED);
        let unsupported = ProcessorError::new("tiff").with_code(codes::UNSUPPORTED_FORMAT);
        let invalid = ProcessorError::new("oops").with_code(codes::INVALID_PIPELINE);

        assert!(processor.is_skippable(&corrupted));
        assert!(processor.is_skippable(&unsupported));
        assert!(!processor.is_skippable(&ProcessorError::new("Rate limit exceeded (429)")));
        assert!(!processor.is_skippable(&ProcessorError::new("IMAGE_DOWNLOAD_FAILED")));
        assert!(!processor.is_skippable(&invalid));
    }

    #[test]
    fn test_skip_disabled() {
        let processor = PipelineJobProcessor::new(Arc::new(NoStages), false);
        let too_large = ProcessorError::new("x").with_code(codes::IMAGE_TOO_LARGE);
        assert!(!processor.is_skippable(&too_large));
    }
}
