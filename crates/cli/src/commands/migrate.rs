//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! larder-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `LARDER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! `crates/api/migrations/`, applied in filename order and recorded in
//! `_sqlx_migrations`.

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// The database URL from `LARDER_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("LARDER_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Run all pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    let database_url =
        database_url().ok_or(MigrationError::MissingEnvVar("LARDER_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
