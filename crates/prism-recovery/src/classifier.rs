//! Maps raw failure messages to an error category and an error code.
//!
//! Both functions are pure. Rules are evaluated top to bottom and the
//! first match wins, so the order of [`CATEGORY_RULES`], [`CODE_PATTERNS`],
//! and [`STATUS_FALLBACKS`] is part of the contract.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use prism_entity::ErrorType;

use crate::codes;

/// One ordered category rule, applied to the lower-cased message.
struct CategoryRule {
    category: ErrorType,
    matches: fn(&str) -> bool,
}

const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: ErrorType::RateLimit,
        matches: is_rate_limit,
    },
    CategoryRule {
        category: ErrorType::Timeout,
        matches: is_timeout,
    },
    CategoryRule {
        category: ErrorType::ImageSize,
        matches: is_image_size,
    },
    CategoryRule {
        category: ErrorType::Authorization,
        matches: is_authorization,
    },
    CategoryRule {
        category: ErrorType::Database,
        matches: is_database,
    },
    CategoryRule {
        category: ErrorType::Network,
        matches: is_network,
    },
];

fn is_rate_limit(m: &str) -> bool {
    m.contains("rate limit") || m.contains("429")
}

fn is_timeout(m: &str) -> bool {
    m.contains("timeout") || m.contains("timed out")
}

fn is_image_size(m: &str) -> bool {
    m.contains("image") && m.contains("large")
}

fn is_authorization(m: &str) -> bool {
    m.contains("unauthorized") || m.contains("403")
}

fn is_database(m: &str) -> bool {
    m.contains("database") || m.contains("sql")
}

fn is_network(m: &str) -> bool {
    m.contains("network") || m.contains("connection")
}

/// Code patterns, tried in order; the first capture group is the code.
const CODE_PATTERNS: &[&str] = &[
    r"ERROR_(\w+)",
    r"([A-Z_]+_ERROR)",
    r"(\w+_LIMIT_EXCEEDED)",
    r"([A-Z_]+_FAILED)",
];

static COMPILED_CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    CODE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("error code pattern is valid"))
        .collect()
});

/// Literal HTTP status fragments checked against the raw message.
const STATUS_FALLBACKS: &[(&str, &str)] = &[
    ("429", codes::RATE_LIMIT_EXCEEDED),
    ("401", codes::UNAUTHORIZED),
    ("403", codes::INSUFFICIENT_PERMISSIONS),
    ("404", codes::RESOURCE_NOT_FOUND),
    ("500", codes::SERVER_ERROR),
];

/// Both halves of the taxonomy for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub error_type: ErrorType,
    pub error_code: String,
}

/// Map a message to its coarse category.
pub fn categorize_error(message: &str) -> ErrorType {
    let lowered = message.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|rule| (rule.matches)(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(ErrorType::Unknown)
}

/// Extract a fine-grained error code from a message.
///
/// Codes such as `INVALID_PIPELINE` are never inferred here; callers that
/// know them pass them explicitly.
pub fn extract_error_code(message: &str) -> String {
    for pattern in COMPILED_CODE_PATTERNS.iter() {
        if let Some(code) = pattern.captures(message).and_then(|c| c.get(1)) {
            return code.as_str().to_string();
        }
    }

    if let Some((_, code)) = STATUS_FALLBACKS
        .iter()
        .find(|(status, _)| message.contains(status))
    {
        return (*code).to_string();
    }

    if message.to_lowercase().contains("timeout") {
        return codes::TIMEOUT_ERROR.to_string();
    }

    codes::UNKNOWN_ERROR.to_string()
}

/// Categorize and extract in one call.
pub fn classify(message: &str) -> Classification {
    Classification {
        error_type: categorize_error(message),
        error_code: extract_error_code(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_keywords() {
        assert_eq!(categorize_error("429 rate limit"), ErrorType::RateLimit);
        assert_eq!(categorize_error("Request Timed Out"), ErrorType::Timeout);
        assert_eq!(
            categorize_error("Image is too large to process"),
            ErrorType::ImageSize
        );
        assert_eq!(categorize_error("403 Forbidden"), ErrorType::Authorization);
        assert_eq!(
            categorize_error("SQL constraint violated"),
            ErrorType::Database
        );
        assert_eq!(categorize_error("connection reset"), ErrorType::Network);
        assert_eq!(categorize_error("something odd"), ErrorType::Unknown);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        assert_eq!(
            categorize_error("rate limit hit while waiting on connection timeout"),
            ErrorType::RateLimit
        );
        assert_eq!(categorize_error("database timeout"), ErrorType::Timeout);
        assert_eq!(
            categorize_error("image too large for database column"),
            ErrorType::ImageSize
        );
    }

    #[test]
    fn test_invalid_pipeline_is_not_inferred() {
        let c = classify("INVALID_PIPELINE: missing stage");
        assert_eq!(c.error_type, ErrorType::Unknown);
        assert_eq!(c.error_code, codes::UNKNOWN_ERROR);
    }

    #[test]
    fn test_extract_patterns_in_order() {
        assert_eq!(extract_error_code("upstream said ERROR_QUOTA"), "QUOTA");
        assert_eq!(
            extract_error_code("DATABASE_ERROR: locked"),
            "DATABASE_ERROR"
        );
        assert_eq!(
            extract_error_code("RATE_LIMIT_EXCEEDED for key"),
            "RATE_LIMIT_EXCEEDED"
        );
        assert_eq!(
            extract_error_code("IMAGE_DOWNLOAD_FAILED after redirect"),
            "IMAGE_DOWNLOAD_FAILED"
        );
        assert_eq!(
            extract_error_code("ERROR_STAGE with NETWORK_ERROR"),
            "STAGE"
        );
    }

    #[test]
    fn test_extract_status_fallbacks() {
        assert_eq!(
            extract_error_code("HTTP 429 Too Many Requests"),
            codes::RATE_LIMIT_EXCEEDED
        );
        assert_eq!(extract_error_code("got 401"), codes::UNAUTHORIZED);
        assert_eq!(
            extract_error_code("got 403"),
            codes::INSUFFICIENT_PERMISSIONS
        );
        assert_eq!(extract_error_code("got 404"), codes::RESOURCE_NOT_FOUND);
        assert_eq!(extract_error_code("upstream 500"), codes::SERVER_ERROR);
        assert_eq!(
            extract_error_code("read Timeout after 30s"),
            codes::TIMEOUT_ERROR
        );
        assert_eq!(
            extract_error_code("request timed out"),
            codes::UNKNOWN_ERROR
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let msg = "connection refused by stage ERROR_UPSTREAM (503)";
        assert_eq!(classify(msg), classify(msg));
    }
}
