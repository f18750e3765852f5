//! Miniflux integration: the source of unread entries and the sink for
//! read-state changes.
//!
//! - [`FeedSource`] - the two operations the triage engine needs
//! - [`MinifluxClient`] - reqwest-based implementation over the v1 REST API

mod client;
mod types;

use async_trait::async_trait;

use crate::domain::Entry;

pub use client::{MinifluxClient, MinifluxError};

/// Where unread entries come from and where read-state changes go.
///
/// `mark_read` must submit the whole ID set as one request; the triage
/// engine treats that call as its unit of atomicity.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn list_unread(&self, category_id: i64) -> Result<Vec<Entry>, MinifluxError>;

    async fn mark_read(&self, entry_ids: &[i64]) -> Result<(), MinifluxError>;
}
