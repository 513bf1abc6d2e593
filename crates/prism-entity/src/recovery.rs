//! Recovery actions attached to error codes.

use serde::{Deserialize, Serialize};

/// What should happen after a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    Retry,
    Skip,
    Restart,
    ManualReview,
}

impl RecoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::Restart => "restart",
            Self::ManualReview => "manual_review",
        }
    }
}

/// Urgency of the recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Static policy entry for one error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub action: RecoveryKind,
    /// Whether the action may be applied without a human.
    pub automated: bool,
    pub priority: RecoveryPriority,
}

impl RecoveryAction {
    pub const fn new(action: RecoveryKind, automated: bool, priority: RecoveryPriority) -> Self {
        Self {
            action,
            automated,
            priority,
        }
    }
}
