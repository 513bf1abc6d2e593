//! Critical alert configuration.

use serde::{Deserialize, Serialize};

/// Out-of-band alerting for critical error codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Whether critical alerts are raised at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
