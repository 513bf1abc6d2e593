//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field has a default, so an empty configuration is valid.

pub mod alerts;
pub mod logging;
pub mod scheduler;
pub mod stages;

use serde::{Deserialize, Serialize};

use self::alerts::AlertConfig;
use self::logging::LoggingConfig;
use self::scheduler::SchedulerConfig;
use self::stages::StageConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Job scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Analysis stage client settings.
    pub stages: StageConfig,
    /// Error log database. When absent, errors are kept in memory.
    pub database: Option<DatabaseConfig>,
    /// Critical alert settings.
    pub alerts: AlertConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `PRISM__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(env_source())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        Self::finish(config)
    }

    /// Load configuration from a single file plus environment overrides.
    /// The file must exist.
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(true))
            .add_source(env_source())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        Self::finish(config)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.scheduler.concurrency == 0 {
            return Err(AppError::configuration(
                "scheduler.concurrency must be at least 1",
            ));
        }
        if self.scheduler.default_max_attempts == 0 {
            return Err(AppError::configuration(
                "scheduler.default_max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    fn finish(config: config::Config) -> Result<Self, AppError> {
        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("PRISM")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = config::Config::builder().build().expect("build");
        let parsed = AppConfig::finish(config).expect("defaults are valid");
        assert_eq!(parsed.scheduler.concurrency, 2);
        assert_eq!(parsed.scheduler.default_max_attempts, 3);
        assert!(parsed.database.is_none());
        assert!(parsed.alerts.enabled);
        assert_eq!(parsed.logging.format, "pretty");
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config::Config::builder()
            .set_override("scheduler.concurrency", 5)
            .expect("override")
            .set_override("database.url", "postgres://localhost/prism")
            .expect("override")
            .build()
            .expect("build");
        let parsed = AppConfig::finish(config).expect("valid");
        assert_eq!(parsed.scheduler.concurrency, 5);
        let db = parsed.database.expect("database section");
        assert_eq!(db.max_connections, 10);
    }

    #[test]
    fn test_missing_explicit_file_is_rejected() {
        let err = AppConfig::from_file("/nonexistent/prism/settings.toml").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }
}
