use super::schema::Database;
use super::types::DatabaseError;
use crate::domain::{Entry, Rating};

impl Database {
    // ========================================================================
    // Rating Operations
    // ========================================================================

    /// Persist the human rating for an entry together with a copy of the entry.
    ///
    /// An entry can be rated once; a second attempt returns
    /// [`DatabaseError::AlreadyRated`] and leaves the first rating in place.
    pub async fn store_rating(&self, entry: &Entry, rating: Rating) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO entry (id, feed_id, updated, rating, title, url, content)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(entry.id)
        .bind(entry.feed_id)
        .bind(now)
        .bind(rating.as_str())
        .bind(&entry.title)
        .bind(&entry.url)
        .bind(&entry.content)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // Rowid primary keys report through the generic UNIQUE message on some builds
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation()
                    || db_err.message().contains("UNIQUE constraint failed") =>
            {
                Err(DatabaseError::AlreadyRated(entry.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The stored rating for an entry, if any.
    pub async fn rating(&self, entry_id: i64) -> Result<Option<Rating>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT rating FROM entry WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(name,)| match name.parse() {
            Ok(rating) => Some(rating),
            Err(e) => {
                tracing::warn!(entry_id, error = %e, "Ignoring unknown rating in store");
                None
            }
        }))
    }
}
