//! Configuration types for crawling, extraction, and matching.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::policy::PolicyTargeting;
use crate::error::{PilotError, Result};
use crate::security::credentials::LlmCredentials;

/// Configuration for a crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Minimum delay between consecutive fetches.
    ///
    /// Default: 1000 ms.
    pub delay_ms: u64,

    /// Per-fetch time budget.
    ///
    /// Default: 30 s.
    pub fetch_timeout_secs: u64,

    /// Bound on concurrent parse/extract jobs on the blocking pool.
    ///
    /// Default: 4.
    pub extraction_workers: usize,

    /// Normalized pages shorter than this are recorded as failures.
    ///
    /// Default: 100 characters.
    pub min_content_chars: usize,

    /// User agent sent by the HTTP fetcher.
    pub user_agent: String,

    /// Targeting applied to every crawled record.
    #[serde(default)]
    pub default_targeting: PolicyTargeting,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            fetch_timeout_secs: 30,
            extraction_workers: 4,
            min_content_chars: 100,
            user_agent: "PolicyPilot-Crawler/1.0".to_string(),
            default_targeting: PolicyTargeting::default(),
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_extraction_workers(mut self, workers: usize) -> Self {
        self.extraction_workers = workers.max(1);
        self
    }

    pub fn with_min_content_chars(mut self, chars: usize) -> Self {
        self.min_content_chars = chars;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_default_targeting(mut self, targeting: PolicyTargeting) -> Self {
        self.default_targeting = targeting;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Defaults and caps used by the field extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Ceiling recorded when the page states none (whole yuan).
    ///
    /// Default: 1,000,000 (100万元). Always flagged in provenance.
    pub placeholder_amount: u64,

    /// Deadline recorded when the page states none.
    pub placeholder_deadline: NaiveDate,

    pub max_industry_tags: usize,

    pub max_requirements: usize,

    /// Requirement clauses must be longer than this many characters.
    pub min_requirement_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            placeholder_amount: 1_000_000,
            placeholder_deadline: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            max_industry_tags: 5,
            max_requirements: 6,
            min_requirement_chars: 4,
        }
    }
}

impl ExtractorConfig {
    pub fn with_placeholder_amount(mut self, amount: u64) -> Self {
        self.placeholder_amount = amount;
        self
    }

    pub fn with_placeholder_deadline(mut self, deadline: NaiveDate) -> Self {
        self.placeholder_deadline = deadline;
        self
    }
}

/// Configuration for matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Results returned. Default: 5.
    pub top_k: usize,

    /// Results below this score are dropped. Default: 0.3.
    pub min_score: f64,

    /// Shortlist size is `top_k * shortlist_factor`. Default: 2.
    pub shortlist_factor: usize,

    /// Chat model for the semantic assessment.
    pub model: String,

    /// Default: 0.3.
    pub temperature: f32,

    /// Default: 1000.
    pub max_tokens: u32,

    /// Per-candidate completion budget. Default: 10 s.
    pub llm_timeout_secs: u64,

    /// Default: 15 s.
    pub embed_timeout_secs: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
            shortlist_factor: 2,
            model: "deepseek-chat".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            llm_timeout_secs: 10,
            embed_timeout_secs: 15,
        }
    }
}

impl MatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_llm_timeout_secs(mut self, secs: u64) -> Self {
        self.llm_timeout_secs = secs;
        self
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn shortlist_size(&self) -> usize {
        self.top_k.saturating_mul(self.shortlist_factor.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PilotError::invalid_argument("top_k must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(PilotError::invalid_argument(format!(
                "min_score must be in [0,1], got {}",
                self.min_score
            )));
        }
        Ok(())
    }
}

/// Top-level configuration assembled from the environment.
#[derive(Debug, Clone, Default)]
pub struct PilotConfig {
    pub crawl: CrawlConfig,
    pub extractor: ExtractorConfig,
    pub matching: MatchConfig,

    /// Language-model credentials; `None` runs heuristic-only.
    pub llm: Option<LlmCredentials>,

    /// Embedding model; `None` disables vector retrieval.
    pub embedding_model: Option<String>,
}

impl PilotConfig {
    /// Load configuration from environment variables.
    ///
    /// Callers that want `.env` support load it first (`dotenvy::dotenv()`).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = parse_env::<u64>("CRAWL_DELAY_MS")? {
            config.crawl.delay_ms = ms;
        }
        if let Some(secs) = parse_env::<u64>("CRAWL_TIMEOUT_SECS")? {
            config.crawl.fetch_timeout_secs = secs;
        }
        if let Some(workers) = parse_env::<usize>("CRAWL_WORKERS")? {
            config.crawl.extraction_workers = workers.max(1);
        }
        if let Ok(agent) = env::var("CRAWL_USER_AGENT") {
            config.crawl.user_agent = agent;
        }
        if let Some(secs) = parse_env::<u64>("LLM_TIMEOUT_SECS")? {
            config.matching.llm_timeout_secs = secs;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            config.matching.model = model;
        }

        config.llm = match env::var("LLM_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                let creds = LlmCredentials::new(key, config.matching.model.clone());
                Some(match env::var("LLM_BASE_URL") {
                    Ok(url) if !url.trim().is_empty() => creds.with_base_url(url),
                    _ => creds,
                })
            }
            _ => None,
        };
        config.embedding_model = env::var("EMBEDDING_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty());

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PilotError::Config(format!("{name} must be a valid number, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}
