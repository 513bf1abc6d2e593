//! Job scheduler configuration.

use serde::{Deserialize, Serialize};

/// Settings for the in-process job scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of jobs allowed in the `active` state at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts granted to a job when the submitter does not specify one.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    /// Capacity of the lifecycle event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// Seconds to wait for in-flight jobs during shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            default_max_attempts: default_max_attempts(),
            event_buffer_size: default_event_buffer(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_event_buffer() -> usize {
    256
}

fn default_shutdown_grace() -> u64 {
    30
}
