//! Analysis stage client configuration.

use serde::{Deserialize, Serialize};

/// How the pipeline processor reaches analysis stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Base URL of the analysis stage service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Skip images whose failure maps to a `skip` recovery action
    /// instead of failing the whole attempt.
    #[serde(default = "default_true")]
    pub skip_defective_images: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            skip_defective_images: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}
