use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{EntriesResponse, UpdateEntriesRequest, WireCategory, WireEntry, WireFeed};
use super::FeedSource;
use crate::domain::{Category, Entry, Feed};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024; // 32MB
const PAGE_SIZE: usize = 250;

/// Errors from talking to the Miniflux API.
#[derive(Debug, Error)]
pub enum MinifluxError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body was not the JSON we expected
    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Configured hostname is not a usable http(s) URL
    #[error("Invalid Miniflux URL: {0}")]
    InvalidUrl(String),
}

/// Thin client for the Miniflux v1 REST API.
///
/// The API key is sent as `X-Auth-Token` and never appears in logs or
/// `Debug` output.
pub struct MinifluxClient {
    http: reqwest::Client,
    base: String,
    api_key: SecretString,
}

impl std::fmt::Debug for MinifluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinifluxClient")
            .field("base", &self.base)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl MinifluxClient {
    pub fn new(hostname: &str, api_key: SecretString) -> Result<Self, MinifluxError> {
        Self::with_client(reqwest::Client::new(), hostname, api_key)
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        hostname: &str,
        api_key: SecretString,
    ) -> Result<Self, MinifluxError> {
        let parsed =
            Url::parse(hostname).map_err(|e| MinifluxError::InvalidUrl(format!("{hostname}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(MinifluxError::InvalidUrl(format!(
                    "unsupported scheme '{scheme}'"
                )))
            }
        }

        Ok(Self {
            http,
            base: hostname.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, MinifluxError> {
        let mut url = Url::parse(&format!("{}/v1/{}", self.base, path))
            .map_err(|e| MinifluxError::InvalidUrl(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, MinifluxError> {
        let request = request.header("X-Auth-Token", self.api_key.expose_secret());

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| MinifluxError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = %status, url = %response.url(), "Miniflux returned an error status");
            return Err(MinifluxError::HttpStatus(status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RESPONSE_SIZE {
                return Err(MinifluxError::ResponseTooLarge);
            }
        }

        let bytes = tokio::time::timeout(REQUEST_TIMEOUT, response.bytes())
            .await
            .map_err(|_| MinifluxError::Timeout)??;
        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(MinifluxError::ResponseTooLarge);
        }
        Ok(bytes.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MinifluxError> {
        let url = self.endpoint(path, query)?;
        let body = self.send(self.http.get(url)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// All categories of the user.
    pub async fn categories(&self) -> Result<Vec<Category>, MinifluxError> {
        let categories: Vec<WireCategory> = self.get_json("categories", &[]).await?;
        Ok(categories.into_iter().map(Category::from).collect())
    }

    /// All feeds of the user.
    pub async fn feeds(&self) -> Result<Vec<Feed>, MinifluxError> {
        let feeds: Vec<WireFeed> = self.get_json("feeds", &[]).await?;
        Ok(feeds.into_iter().map(Feed::from).collect())
    }

    /// A single entry by ID, regardless of its read state.
    pub async fn entry(&self, entry_id: i64) -> Result<Entry, MinifluxError> {
        let entry: WireEntry = self.get_json(&format!("entries/{entry_id}"), &[]).await?;
        Ok(entry.into())
    }

    /// Unread entries of one category, oldest first.
    ///
    /// Pages through the listing until the reported total is reached.
    pub async fn unread_entries(&self, category_id: i64) -> Result<Vec<Entry>, MinifluxError> {
        let path = format!("categories/{category_id}/entries");
        let limit = PAGE_SIZE.to_string();
        let mut entries: Vec<Entry> = Vec::new();

        loop {
            let offset = entries.len().to_string();
            let page: EntriesResponse = self
                .get_json(
                    &path,
                    &[
                        ("status", "unread"),
                        ("order", "published_at"),
                        ("direction", "asc"),
                        ("limit", limit.as_str()),
                        ("offset", offset.as_str()),
                    ],
                )
                .await?;

            let received = page.entries.len();
            entries.extend(page.entries.into_iter().map(Entry::from));

            if received == 0 || entries.len() as i64 >= page.total {
                if (entries.len() as i64) < page.total {
                    tracing::warn!(
                        category_id,
                        total = page.total,
                        received = entries.len(),
                        "Listing ended before the reported total"
                    );
                }
                break;
            }
        }

        Ok(entries)
    }

    /// Set the status of many entries in a single request.
    pub async fn update_entries(&self, entry_ids: &[i64], status: &str) -> Result<(), MinifluxError> {
        let url = self.endpoint("entries", &[])?;
        let body = serde_json::to_vec(&UpdateEntriesRequest { entry_ids, status })?;
        let request = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl FeedSource for MinifluxClient {
    async fn list_unread(&self, category_id: i64) -> Result<Vec<Entry>, MinifluxError> {
        self.unread_entries(category_id).await
    }

    async fn mark_read(&self, entry_ids: &[i64]) -> Result<(), MinifluxError> {
        self.update_entries(entry_ids, "read").await
    }
}
