pub mod sessions;
pub mod users;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Get the path to the database file using platform-specific data directory
pub fn get_db_path() -> Result<PathBuf> {
    let mut path =
        dirs::data_dir().context("Unable to determine data directory for your platform")?;

    path.push("podium");

    std::fs::create_dir_all(&path).context("Failed to create podium data directory")?;

    path.push("sessions.db");
    Ok(path)
}

/// Create a connection pool to the SQLite database at the default location
pub async fn create_pool() -> Result<SqlitePool> {
    let db_path = get_db_path()?;
    open(&db_path).await
}

/// Open (creating if missing) the database at `path` and run migrations
pub async fn open(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// In-memory database for tests. A single connection keeps every query on
/// the same SQLite memory instance.
pub async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_has_schema() {
        let pool = memory_pool().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let pool = open(&path).await;
        assert!(pool.is_ok());
        assert!(path.exists());
    }
}
