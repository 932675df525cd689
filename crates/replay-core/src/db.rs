//! Database access layer for PostgreSQL.

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;

/// Default location of the sqlx migration scripts.
pub const MIGRATIONS_DIR: &str = "./migrations";

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// Run database migrations from the given directory.
pub async fn run_migrations(pool: &PgPool, dir: impl AsRef<Path>) -> Result<()> {
    let migrator = sqlx::migrate::Migrator::new(dir.as_ref()).await?;
    migrator.run(pool).await?;
    Ok(())
}
