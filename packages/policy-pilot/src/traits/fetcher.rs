//! Page fetching.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchResult;

/// Raw page body as returned by a fetcher, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    /// Final URL after redirects
    pub url: String,

    /// Raw HTML (or plain text) body
    pub body: String,

    /// MIME type if the transport reported one
    pub content_type: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Whether the body holds anything besides whitespace.
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Fetches a single page by URL.
///
/// Implementations should map "cannot operate at all" conditions to
/// [`FetchError::Transport`](crate::error::FetchError::Transport); every
/// other error only fails the one target.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<RawPage>;

    /// Fetcher name for logging.
    fn name(&self) -> &str {
        "fetcher"
    }
}
