//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use prism_core::error::AppError;
use prism_database::connection::mask_password;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let mut config = super::load_config(config_path)?;

    match &args.command {
        ConfigCommand::Show => {
            if let Some(database) = config.database.as_mut() {
                database.url = mask_password(&database.url);
            }
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => {
            config.validate()?;
            output::print_success("Configuration is valid");
            output::print_kv("Concurrency", &config.scheduler.concurrency.to_string());
            output::print_kv(
                "Max attempts",
                &config.scheduler.default_max_attempts.to_string(),
            );
            output::print_kv("Stage service", &config.stages.base_url);
            output::print_kv(
                "Error log",
                if config.database.is_some() {
                    "postgres"
                } else {
                    "memory"
                },
            );
        }
    }

    Ok(())
}
