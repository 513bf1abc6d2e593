//! Built-in job processors.

pub mod http_stage;
pub mod pipeline;

pub use http_stage::HttpStageRunner;
pub use pipeline::{PipelineJobProcessor, StageRunner};
