//! Offline error classification.

use clap::Args;
use serde::Serialize;

use prism_core::error::AppError;
use prism_entity::RecoveryAction;
use prism_recovery::{classify, get_recovery_action, get_user_friendly_message, is_critical_error};

use crate::output::{self, OutputFormat};

/// Arguments for the classify command
#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Raw error message
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ClassifyReport {
    error_type: String,
    error_code: String,
    recovery: Option<RecoveryAction>,
    critical: bool,
    user_message: String,
}

/// Execute the classify command
pub fn execute(args: &ClassifyArgs, format: OutputFormat) -> Result<(), AppError> {
    let classification = classify(&args.message);
    let code = classification.error_code;

    let report = ClassifyReport {
        error_type: classification.error_type.to_string(),
        recovery: get_recovery_action(&code),
        critical: is_critical_error(&code),
        user_message: get_user_friendly_message(&code, Some(&args.message)),
        error_code: code,
    };

    match format {
        OutputFormat::Json => output::print_item(&report, format),
        OutputFormat::Table => {
            output::print_kv("Error type", &report.error_type);
            output::print_kv("Error code", &report.error_code);
            let recovery = report
                .recovery
                .map(|r| {
                    format!(
                        "{} ({:?}, automated: {})",
                        r.action.as_str(),
                        r.priority,
                        r.automated
                    )
                })
                .unwrap_or_else(|| "none".to_string());
            output::print_kv("Recovery", &recovery);
            output::print_kv("Critical", &report.critical.to_string());
            output::print_kv("User message", &report.user_message);
        }
    }

    Ok(())
}
