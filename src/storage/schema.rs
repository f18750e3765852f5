use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::migrations::{reconcile, MIGRATIONS};
use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// The rating store: migration history, mirrored categories and feeds, and
/// the ratings a human gave to kept entries.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and bring its schema up to date.
    ///
    /// Migrations run before the handle is returned, so no other store access
    /// can happen against an outdated schema.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if the recorded history is ahead of
    /// or diverges from [`MIGRATIONS`], and `DatabaseError::Other` for
    /// connection or SQL failures.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: wait up to 5 seconds for a lock before SQLITE_BUSY
        let options = SqliteConnectOptions::from_str(&url)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        let applied = db.migrate_with(MIGRATIONS).await?;
        if applied > 0 {
            tracing::info!(applied, path = %path, "Database schema updated");
        } else {
            tracing::debug!(path = %path, "Database schema up to date");
        }
        Ok(db)
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Statements recorded in the `migration` table, oldest first.
    pub async fn applied_migrations(&self) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT query FROM migration ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(query,)| query).collect())
    }

    /// Apply whatever part of `desired` the store has not seen yet.
    ///
    /// Each statement and its history row commit in the same transaction, so
    /// a crash leaves either both or neither. Returns the number of statements
    /// applied.
    pub(crate) async fn migrate_with(&self, desired: &[&str]) -> Result<usize, DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migration (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        let applied = self.applied_migrations().await?;
        let pending = reconcile(desired, &applied[..])?;

        for (offset, statement) in pending.iter().enumerate() {
            let mut tx = self.pool.begin().await?;

            sqlx::query(*statement).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO migration (query) VALUES (?)")
                .bind(*statement)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            tracing::debug!(position = applied.len() + offset, "Applied migration");
        }

        Ok(pending.len())
    }
}
