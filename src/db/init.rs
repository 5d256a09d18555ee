use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./src/db/migrations");

/// Opens (creating if needed) the SQLite file and brings the schema up to
/// date.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let path = database_url.trim_start_matches("sqlite://");
    let options = SqliteConnectOptions::new()
        .filename(Path::new(path))
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database '{}'", path))?;

    MIGRATOR
        .run(&pool)
        .await
        .with_context(|| "Failed to run database migrations")?;

    info!(database = path, "Database ready");
    Ok(pool)
}
