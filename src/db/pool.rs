//! Database connection pool
//!
//! Creates the SQLite connection pool for the service. The pool factory is
//! the startup gate for the data store: if the database cannot be opened and
//! pinged, boot fails loudly instead of limping along without persistence.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

/// Connection pool handle shared across the service
pub type DbPool = SqlitePool;

/// Create a SQLite connection pool from configuration.
///
/// For file-based databases the parent directory is created if missing and
/// the connection runs in `rwc` mode. Foreign keys are enabled on the pool.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or does not answer a
/// ping; callers at boot are expected to propagate this and abort.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let url = &config.url;

    if !url.starts_with(":memory:") && !url.starts_with("sqlite::memory:") {
        let path = url.strip_prefix("sqlite:").unwrap_or(url);

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {:?}", parent)
                })?;
            }
        }
    }

    let connection_url = if url.starts_with("sqlite:") {
        if url.contains('?') {
            url.to_string()
        } else {
            format!("{}?mode=rwc", url)
        }
    } else if url == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{}?mode=rwc", url)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .connect(&connection_url)
        .await
        .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .context("Failed to enable foreign keys")?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .context("Database ping failed")?;

    Ok(pool)
}

/// Create a SQLite in-memory database pool for testing.
///
/// Pinned to a single connection: every pool connection to `:memory:` opens
/// its own blank database, so a wider pool would lose the migrated schema.
pub async fn create_test_pool() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("Failed to create in-memory database")?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .context("Failed to enable foreign keys")?;

    Ok(pool)
}
