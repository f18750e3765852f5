use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

use super::schema::Database;
use super::types::Summary;
use crate::domain::Rating;

/// Parse a stored rating name, logging rows a newer build may have written.
fn parse_rating(name: &str) -> Option<Rating> {
    match name.parse() {
        Ok(rating) => Some(rating),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unknown rating in report");
            None
        }
    }
}

impl Database {
    // ========================================================================
    // Reporting Queries
    // ========================================================================

    pub async fn total_entries(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entry")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Rated entries per category.
    pub async fn entries_by_category(&self) -> Result<HashMap<i64, i64>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT feed.category_id, COUNT(*)
            FROM entry
            JOIN feed ON entry.feed_id = feed.id
            GROUP BY feed.category_id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn ratings_by_status(&self) -> Result<HashMap<Rating, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT rating, COUNT(*) FROM entry GROUP BY rating")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(name, count)| parse_rating(&name).map(|r| (r, count)))
            .collect())
    }

    /// Category x rating counts.
    pub async fn category_rating_matrix(&self) -> Result<BTreeMap<i64, HashMap<Rating, i64>>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT feed.category_id, entry.rating, COUNT(*)
            FROM entry
            JOIN feed ON entry.feed_id = feed.id
            GROUP BY feed.category_id, entry.rating
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matrix: BTreeMap<i64, HashMap<Rating, i64>> = BTreeMap::new();
        for (category_id, name, count) in rows {
            if let Some(rating) = parse_rating(&name) {
                matrix.entry(category_id).or_default().insert(rating, count);
            }
        }
        Ok(matrix)
    }

    pub async fn category_names(&self) -> Result<HashMap<i64, String>> {
        Ok(self
            .categories()
            .await?
            .into_iter()
            .map(|c| (c.id, c.title))
            .collect())
    }

    /// Gather every reporting query into one [`Summary`].
    ///
    /// A failing query is logged and leaves its part of the summary empty, so
    /// one bad query does not hide the rest of the report.
    pub async fn summary(&self) -> Summary {
        let total_entries = self.total_entries().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not count entries");
            0
        });
        let by_category = self.entries_by_category().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not count entries by category");
            HashMap::new()
        });
        let by_rating = self.ratings_by_status().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not count ratings");
            HashMap::new()
        });
        let category_rating = self.category_rating_matrix().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not build category rating matrix");
            BTreeMap::new()
        });
        let category_names = self.category_names().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not load category names");
            HashMap::new()
        });

        Summary {
            total_entries,
            by_category,
            by_rating,
            category_rating,
            category_names,
        }
    }
}
