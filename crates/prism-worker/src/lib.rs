//! Job scheduling and processing for Prism analysis jobs.
//!
//! This crate provides:
//! - An in-process job store that owns every [`JobRecord`](prism_entity::JobRecord)
//! - A [`Scheduler`] that dispatches waiting jobs FIFO under a concurrency
//!   ceiling and routes failures through the error classifier
//! - The [`JobProcessor`] seam invoked once per attempt
//! - A built-in pipeline processor that runs analysis stages over images

pub mod events;
pub mod jobs;
pub mod processor;
pub mod scheduler;
mod store;

pub use events::JobEvent;
pub use processor::{FnProcessor, JobContext, JobProcessor, ProcessorError, processor_fn};
pub use scheduler::{Scheduler, SubmitOptions};
