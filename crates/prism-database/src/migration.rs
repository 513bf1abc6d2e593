//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use prism_core::error::{AppError, ErrorKind};

/// Apply all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running error log migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Error log migrations applied");
    Ok(())
}
