use anyhow::Result;

use super::schema::Database;
use crate::domain::{Category, Feed};

impl Database {
    // ========================================================================
    // Category & Feed Mirror
    // ========================================================================

    /// Mirror Miniflux categories (INSERT .. ON CONFLICT DO UPDATE).
    pub async fn upsert_categories(&self, categories: &[Category]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO category (id, title)
                VALUES (?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title
            "#,
            )
            .bind(category.id)
            .bind(&category.title)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Mirror Miniflux feeds. Their categories must already be mirrored.
    pub async fn upsert_feeds(&self, feeds: &[Feed]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for feed in feeds {
            sqlx::query(
                r#"
                INSERT INTO feed (id, category_id, feed_url, site_url, title)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    category_id = excluded.category_id,
                    feed_url = excluded.feed_url,
                    site_url = excluded.site_url,
                    title = excluded.title
            "#,
            )
            .bind(feed.id)
            .bind(feed.category_id)
            .bind(&feed.feed_url)
            .bind(&feed.site_url)
            .bind(&feed.title)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All mirrored categories ordered by id.
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, title FROM category ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, title)| Category { id, title })
            .collect())
    }

    /// All mirrored feeds ordered by id.
    pub async fn feeds(&self) -> Result<Vec<Feed>> {
        let rows: Vec<(i64, i64, String, String, String)> = sqlx::query_as(
            "SELECT id, category_id, feed_url, site_url, title FROM feed ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, category_id, feed_url, site_url, title)| Feed {
                id,
                category_id,
                feed_url,
                site_url,
                title,
            })
            .collect())
    }
}
