//! Error code taxonomy keys.

pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
pub const API_QUOTA_EXCEEDED: &str = "API_QUOTA_EXCEEDED";
pub const API_TIMEOUT: &str = "API_TIMEOUT";
pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
pub const SERVER_ERROR: &str = "SERVER_ERROR";

pub const IMAGE_TOO_LARGE: &str = "IMAGE_TOO_LARGE";
pub const IMAGE_CORRUPTED: &str = "IMAGE_CORRUPTED";
pub const UNSUPPORTED_FORMAT: &str = "UNSUPPORTED_FORMAT";
pub const IMAGE_DOWNLOAD_FAILED: &str = "IMAGE_DOWNLOAD_FAILED";

pub const INVALID_PIPELINE: &str = "INVALID_PIPELINE";
pub const MISSING_PROMPT: &str = "MISSING_PROMPT";

pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const INSUFFICIENT_PERMISSIONS: &str = "INSUFFICIENT_PERMISSIONS";
pub const SESSION_EXPIRED: &str = "SESSION_EXPIRED";
pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";

pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Every code with an entry in the message table.
pub const ALL: &[&str] = &[
    RATE_LIMIT_EXCEEDED,
    API_QUOTA_EXCEEDED,
    API_TIMEOUT,
    SERVICE_UNAVAILABLE,
    SERVER_ERROR,
    IMAGE_TOO_LARGE,
    IMAGE_CORRUPTED,
    UNSUPPORTED_FORMAT,
    IMAGE_DOWNLOAD_FAILED,
    INVALID_PIPELINE,
    MISSING_PROMPT,
    UNAUTHORIZED,
    INSUFFICIENT_PERMISSIONS,
    SESSION_EXPIRED,
    RESOURCE_NOT_FOUND,
    DATABASE_ERROR,
    STORAGE_ERROR,
    VALIDATION_ERROR,
    NETWORK_ERROR,
    TIMEOUT_ERROR,
    UNKNOWN_ERROR,
];
