//! Static recovery policy keyed by error code.

use prism_entity::{RecoveryAction, RecoveryKind, RecoveryPriority};

use crate::codes;

use RecoveryKind::{ManualReview, Restart, Retry, Skip};
use RecoveryPriority::{Critical, High, Low, Medium};

/// Codes whose occurrence raises an out-of-band alert.
const CRITICAL_CODES: &[&str] = &[
    codes::INVALID_PIPELINE,
    codes::DATABASE_ERROR,
    codes::STORAGE_ERROR,
    codes::API_QUOTA_EXCEEDED,
];

/// Look up the recovery action for a code.
///
/// Returns `None` for unknown codes, including `UNKNOWN_ERROR`; callers must
/// treat that as "not automated".
pub fn get_recovery_action(code: &str) -> Option<RecoveryAction> {
    let (action, automated, priority) = match code {
        codes::RATE_LIMIT_EXCEEDED => (Retry, true, Medium),
        codes::API_TIMEOUT => (Retry, true, Medium),
        codes::SERVICE_UNAVAILABLE => (Retry, true, High),
        codes::SERVER_ERROR => (Retry, true, High),
        codes::DATABASE_ERROR => (Retry, true, Critical),
        codes::NETWORK_ERROR => (Retry, true, Medium),
        codes::TIMEOUT_ERROR => (Retry, true, Medium),
        codes::IMAGE_DOWNLOAD_FAILED => (Retry, true, Medium),
        codes::STORAGE_ERROR => (Restart, true, Critical),
        codes::SESSION_EXPIRED => (Restart, false, Medium),
        codes::IMAGE_TOO_LARGE => (Skip, true, Low),
        codes::IMAGE_CORRUPTED => (Skip, true, Low),
        codes::UNSUPPORTED_FORMAT => (Skip, true, Low),
        codes::RESOURCE_NOT_FOUND => (Skip, true, Low),
        codes::API_QUOTA_EXCEEDED => (ManualReview, false, Critical),
        codes::INVALID_PIPELINE => (ManualReview, false, Critical),
        codes::MISSING_PROMPT => (ManualReview, false, High),
        codes::UNAUTHORIZED => (ManualReview, false, High),
        codes::INSUFFICIENT_PERMISSIONS => (ManualReview, false, High),
        codes::VALIDATION_ERROR => (ManualReview, false, Medium),
        _ => return None,
    };
    Some(RecoveryAction::new(action, automated, priority))
}

/// Whether a code triggers a critical alert.
pub fn is_critical_error(code: &str) -> bool {
    CRITICAL_CODES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes_retry_automatically() {
        for code in [
            codes::RATE_LIMIT_EXCEEDED,
            codes::API_TIMEOUT,
            codes::DATABASE_ERROR,
            codes::TIMEOUT_ERROR,
            codes::NETWORK_ERROR,
        ] {
            let action = get_recovery_action(code).expect("known code");
            assert_eq!(action.action, Retry, "{code}");
            assert!(action.automated, "{code}");
        }
    }

    #[test]
    fn test_item_defects_are_skipped() {
        for code in [codes::IMAGE_TOO_LARGE, codes::IMAGE_CORRUPTED] {
            assert_eq!(get_recovery_action(code).map(|a| a.action), Some(Skip));
        }
    }

    #[test]
    fn test_configuration_defects_need_review() {
        for code in [
            codes::INVALID_PIPELINE,
            codes::MISSING_PROMPT,
            codes::UNAUTHORIZED,
            codes::INSUFFICIENT_PERMISSIONS,
        ] {
            let action = get_recovery_action(code).expect("known code");
            assert_eq!(action.action, ManualReview);
            assert!(!action.automated);
        }
    }

    #[test]
    fn test_unknown_codes_have_no_action() {
        assert_eq!(get_recovery_action(codes::UNKNOWN_ERROR), None);
        assert_eq!(get_recovery_action("QUOTA"), None);
    }

    #[test]
    fn test_critical_allow_list() {
        assert!(is_critical_error(codes::INVALID_PIPELINE));
        assert!(is_critical_error(codes::DATABASE_ERROR));
        assert!(is_critical_error(codes::STORAGE_ERROR));
        assert!(is_critical_error(codes::API_QUOTA_EXCEEDED));
        assert!(!is_critical_error(codes::RATE_LIMIT_EXCEEDED));
        assert!(!is_critical_error(codes::UNKNOWN_ERROR));
    }
}
