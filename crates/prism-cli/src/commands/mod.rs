//! CLI command definitions and dispatch.

pub mod classify;
pub mod config;
pub mod errors;
pub mod migrate;

use clap::{Parser, Subcommand};

use prism_core::config::AppConfig;
use prism_core::error::AppError;
use prism_database::DatabasePool;

use crate::output::OutputFormat;

/// Prism: analysis job error administration
#[derive(Debug, Parser)]
#[command(name = "prism", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file; defaults to config/default.toml plus the PRISM_ENV overlay
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify a raw error message
    Classify(classify::ClassifyArgs),
    /// Inspect and resolve logged errors
    Errors(errors::ErrorsArgs),
    /// Apply database migrations
    Migrate,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Classify(args) => classify::execute(args, self.format),
            Commands::Errors(args) => {
                errors::execute(args, self.config.as_deref(), self.format).await
            }
            Commands::Migrate => migrate::execute(self.config.as_deref()).await,
            Commands::Config(args) => config::execute(args, self.config.as_deref(), self.format),
        }
    }
}

/// Helper: load configuration from an explicit file or the environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, AppError> {
    match config_path {
        Some(path) => AppConfig::from_file(path),
        None => {
            let env = std::env::var("PRISM_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Helper: connect to the error log database
pub async fn connect_database(config: &AppConfig) -> Result<DatabasePool, AppError> {
    let database = config.database.as_ref().ok_or_else(|| {
        AppError::configuration("No [database] section configured; errors are kept in memory only")
    })?;
    DatabasePool::connect(database).await
}
