//! # Database Migrations
//!
//! Embedded SQL migrations for the fiscal back-office schema.
//!
//! The `sqlx::migrate!()` macro embeds every file from
//! `migrations/sqlite/` into the binary at compile time; applied
//! migrations are tracked in `_sqlx_migrations`. Never modify an
//! existing migration file — add a new one with the next sequence
//! number.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent and ordered; each migration runs in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}
