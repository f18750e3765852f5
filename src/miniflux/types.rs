//! Wire types for the subset of the Miniflux v1 API we talk to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, Entry, Feed};

#[derive(Debug, Deserialize)]
pub(crate) struct EntriesResponse {
    /// Unread entries matching the query, across all pages.
    pub total: i64,
    #[serde(default)]
    pub entries: Vec<WireEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireEntry {
    pub id: i64,
    pub feed_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    pub published_at: DateTime<Utc>,
}

impl From<WireEntry> for Entry {
    fn from(e: WireEntry) -> Self {
        Entry {
            id: e.id,
            feed_id: e.feed_id,
            title: e.title,
            url: e.url,
            content: e.content,
            published_at: e.published_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCategory {
    pub id: i64,
    pub title: String,
}

impl From<WireCategory> for Category {
    fn from(c: WireCategory) -> Self {
        Category {
            id: c.id,
            title: c.title,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireFeed {
    pub id: i64,
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub title: String,
    pub category: WireCategory,
}

impl From<WireFeed> for Feed {
    fn from(f: WireFeed) -> Self {
        Feed {
            id: f.id,
            category_id: f.category.id,
            feed_url: f.feed_url,
            site_url: f.site_url,
            title: f.title,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateEntriesRequest<'a> {
    pub entry_ids: &'a [i64],
    pub status: &'a str,
}
