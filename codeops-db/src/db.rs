//! Database connection and configuration

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tracing::debug;

use crate::error::{Error, Result};

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Create a new database config with the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
        }
    }
}

/// Database connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database with the given configuration
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path.display()))?
                .create_if_missing(true)
                .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        debug!(path = %config.path.display(), "Database connected");
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::connect(DatabaseConfig::new(path.as_ref())).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Create the schema if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../migrations/001_run_records.sql");
        sqlx::raw_sql(migration_sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Get the default database path (~/.cache/codeops/codeops.db)
    pub fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Io("Could not determine cache directory".to_string()))?;
        Ok(cache_dir.join("codeops").join("codeops.db"))
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let db = Database::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='run_records'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(result.0, 1);

        db.close().await;
    }

    #[tokio::test]
    async fn test_migrate_is_repeatable() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("test.db")).await.unwrap();
        db.migrate().await.unwrap();
    }

    #[test]
    fn test_default_path() {
        if let Ok(path) = Database::default_path() {
            assert!(path.ends_with("codeops/codeops.db"));
        }
    }
}
