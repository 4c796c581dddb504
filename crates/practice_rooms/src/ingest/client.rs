//! HTTP side of ingestion: resolving board URLs and downloading pages.

use super::config::{Category, SourceConfig};
use super::error::IngestError;
use async_trait::async_trait;
use chrono::Weekday;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

/// Mobile browser UA; the board serves the script-rendered list to mobile clients.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Something that can download a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Issues one GET for `url` and returns the body.
    ///
    /// Transport errors and non-success statuses are `FetchFailure`.
    async fn fetch_page(&self, url: &str) -> Result<String, IngestError>;
}

/// [`PageFetcher`] backed by `reqwest`.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// Creates a fetcher with the default user agent.
    pub fn new() -> Result<Self, IngestError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, IngestError> {
        // No per-request timeout: the run as a whole is bounded by the caller.
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| IngestError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, IngestError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(IngestError::FetchFailure {
                url: url.to_string(),
                message: format!("request failed with status {}", response.status()),
            });
        }

        Ok(response.text().await?)
    }
}

/// A downloaded board page and where it came from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
}

/// Resolves (category, weekday) through the source table and fetches the page.
pub struct SourceFetcher {
    sources: Arc<SourceConfig>,
    pages: Arc<dyn PageFetcher>,
}

impl SourceFetcher {
    pub fn new(sources: Arc<SourceConfig>, pages: Arc<dyn PageFetcher>) -> Self {
        Self { sources, pages }
    }

    /// Fetches the board page for a category on a weekday.
    ///
    /// # Returns
    /// * `Ok(FetchedPage)` - The page body
    /// * `Err(IngestError::MissingSourceMapping)` - No URL configured for the pair
    /// * `Err(IngestError::FetchFailure)` - The request failed
    pub async fn fetch(
        &self,
        category: Category,
        day: Weekday,
    ) -> Result<FetchedPage, IngestError> {
        let url = self.sources.resolve(category, day).ok_or_else(|| {
            IngestError::MissingSourceMapping {
                category: category.to_string(),
                day,
            }
        })?;

        info!(url = %url, category = %category, day = %day, "Fetching board page");

        let body = self.pages.fetch_page(url).await?;
        debug!(url = %url, bytes = body.len(), "Fetched board page");

        Ok(FetchedPage {
            url: url.to_string(),
            body,
        })
    }
}
