mod migrations;
mod models;
mod queries;

pub use models::*;
pub use queries::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the post database at `path` and bring its schema up
    /// to date.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, a migration fails, or the file
    /// turns out to be read-only.
    pub async fn new(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Like toggles hold the write lock for a whole transaction.
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        migrations::run(&pool).await?;
        info!(path = %path.display(), "Post database ready");

        let db = Self { pool };
        db.check_writable()
            .await
            .with_context(|| format!("{} is not writable", path.display()))?;
        Ok(db)
    }

    /// Rewrite the schema version row in place so a read-only mount fails at
    /// startup instead of on the first post.
    async fn check_writable(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE _schema_version SET version = version")
            .execute(&mut *tx)
            .await?;
        tx.rollback().await?;
        Ok(())
    }

    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
