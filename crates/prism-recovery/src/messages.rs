//! Human-readable messages for error codes.

use crate::codes;

const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

fn lookup(code: &str) -> Option<&'static str> {
    let message = match code {
        codes::RATE_LIMIT_EXCEEDED => {
            "The analysis service is receiving too many requests. The job will be retried shortly."
        }
        codes::API_QUOTA_EXCEEDED => {
            "The analysis quota for this account has been used up. Contact an administrator to raise the limit."
        }
        codes::API_TIMEOUT => "The analysis service took too long to respond.",
        codes::SERVICE_UNAVAILABLE => {
            "The analysis service is temporarily unavailable. Please try again later."
        }
        codes::SERVER_ERROR => "The analysis service reported an internal error.",
        codes::IMAGE_TOO_LARGE => "The image is too large to analyze. Try a smaller version.",
        codes::IMAGE_CORRUPTED => "The image file appears to be corrupted and could not be read.",
        codes::UNSUPPORTED_FORMAT => "The image format is not supported.",
        codes::IMAGE_DOWNLOAD_FAILED => "The image could not be downloaded for analysis.",
        codes::INVALID_PIPELINE => {
            "The pipeline configuration is invalid. Check its stages before running it again."
        }
        codes::MISSING_PROMPT => "A pipeline stage is missing its prompt configuration.",
        codes::UNAUTHORIZED => "Your session is not authorized to run this analysis.",
        codes::INSUFFICIENT_PERMISSIONS => {
            "You do not have permission to run this pipeline on this library."
        }
        codes::SESSION_EXPIRED => "Your session has expired. Sign in again and resubmit the job.",
        codes::RESOURCE_NOT_FOUND => "A requested image or pipeline could not be found.",
        codes::DATABASE_ERROR => "A database error occurred while saving analysis results.",
        codes::STORAGE_ERROR => "A storage error occurred while reading or writing images.",
        codes::VALIDATION_ERROR => "The job request is invalid.",
        codes::NETWORK_ERROR => "A network error interrupted the analysis.",
        codes::TIMEOUT_ERROR => "The operation timed out.",
        codes::UNKNOWN_ERROR => GENERIC_MESSAGE,
        _ => return None,
    };
    Some(message)
}

/// Resolve a user-facing message for an error code.
///
/// Known codes use the fixed table. Unknown codes use `fallback` when it is
/// non-empty and the generic message otherwise.
pub fn get_user_friendly_message(code: &str, fallback: Option<&str>) -> String {
    lookup(code)
        .or_else(|| fallback.filter(|f| !f.trim().is_empty()))
        .unwrap_or(GENERIC_MESSAGE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_code_has_a_message() {
        for code in codes::ALL {
            let message = get_user_friendly_message(code, None);
            assert!(!message.is_empty(), "{code} has no message");
            assert_eq!(lookup(code), Some(message.as_str()));
        }
    }

    #[test]
    fn test_table_wins_over_fallback() {
        let message = get_user_friendly_message(codes::TIMEOUT_ERROR, Some("raw text"));
        assert_eq!(message, "The operation timed out.");
    }

    #[test]
    fn test_unknown_code_uses_fallback_then_generic() {
        assert_eq!(
            get_user_friendly_message("QUOTA", Some("quota hit")),
            "quota hit"
        );
        assert_eq!(
            get_user_friendly_message("QUOTA", Some("  ")),
            GENERIC_MESSAGE
        );
        assert_eq!(get_user_friendly_message("QUOTA", None), GENERIC_MESSAGE);
    }
}
