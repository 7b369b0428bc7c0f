//! Paging client for the live items of one CMS collection.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use super::types::{Item, ItemsPage};

/// Items requested per page; a shorter page marks the end of the collection.
pub const PAGE_SIZE: usize = 100;

/// Failure to retrieve the complete collection.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The API answered with a non-success status.
    #[error("upstream API responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The request never produced a response.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body was not a page of items.
    #[error("upstream response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot address a collection.
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Source of the complete, current item collection.
#[async_trait]
pub trait CollectionFetcher: Send + Sync {
    /// Fetch every published item, in API order.
    ///
    /// Either the whole collection is returned or an error; partial results
    /// are never handed back.
    async fn fetch_all(&self) -> Result<Vec<Item>, UpstreamError>;
}

/// Webflow Data API v2 client for `items/live`.
#[derive(Clone)]
pub struct WebflowClient {
    http: Client,
    base_url: String,
    collection_id: String,
    api_token: String,
}

impl WebflowClient {
    /// Create a client for one collection.
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        collection_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            collection_id: collection_id.into(),
            api_token: api_token.into(),
        }
    }

    /// `{base}/collections/{id}/items/live?limit=..&offset=..`
    fn page_url(&self, offset: usize) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["collections", self.collection_id.as_str(), "items", "live"]);

        url.query_pairs_mut()
            .append_pair("limit", &PAGE_SIZE.to_string())
            .append_pair("offset", &offset.to_string());

        Ok(url)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<Item>, UpstreamError> {
        let url = self.page_url(offset)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status_code = status.as_u16(),
                offset = offset,
                body_length = body.len(),
                "upstream_page_failed"
            );
            return Err(UpstreamError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let page: ItemsPage = serde_json::from_slice(&bytes)?;

        info!(
            offset = offset,
            page_items = page.items.len(),
            "upstream_page_fetched"
        );

        Ok(page.items)
    }
}

#[async_trait]
impl CollectionFetcher for WebflowClient {
    async fn fetch_all(&self) -> Result<Vec<Item>, UpstreamError> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(offset).await?;
            let page_len = page.len();
            all.extend(page);

            if page_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        info!(
            collection_id = %self.collection_id,
            item_count = all.len(),
            "upstream_collection_fetched"
        );

        Ok(all)
    }
}
