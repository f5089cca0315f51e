//! HTTP page fetcher.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{PageFetcher, RawPage};
use crate::types::config::CrawlConfig;

/// Fetches pages with a plain GET. No JavaScript rendering.
///
/// # Example
///
/// ```rust,ignore
/// use policy_pilot::crawl::HttpFetcher;
///
/// let fetcher = HttpFetcher::from_config(&CrawlConfig::default())?;
/// let page = fetcher.fetch("https://www.xuhui.gov.cn/zcwj/index.html").await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Build a fetcher with the given user agent and request timeout.
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }

    pub fn from_config(config: &CrawlConfig) -> FetchResult<Self> {
        Self::new(config.user_agent.clone(), config.fetch_timeout())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn parse_target(url: &str) -> FetchResult<Url> {
    let parsed = Url::parse(url.trim()).map_err(|_| FetchError::InvalidUrl {
        url: url.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(FetchError::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<RawPage> {
        let target = parse_target(url)?;
        debug!(url = %target, "HTTP fetch starting");

        let response = self
            .client
            .get(target.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %target, error = %e, "HTTP request failed");
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http(Box::new(e))
            }
        })?;

        debug!(url = %final_url, bytes = body.len(), "HTTP fetch complete");

        let page = RawPage::new(final_url, body).with_fetched_at(Utc::now());
        Ok(match content_type {
            Some(ct) => page.with_content_type(ct),
            None => page,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
