//! Policy announcement extraction and company-to-policy matching.
//!
//! Crawls government policy pages, pulls structured fields (amount ceiling,
//! deadline, jurisdiction, requirements) out of loosely formatted Chinese
//! text, and ranks the resulting corpus against a company profile.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use policy_pilot::{
//!     CrawlConfig, CrawlOrchestrator, CrawlTarget, HttpFetcher, MatchConfig, MemoryStore,
//!     PolicyRecordBuilder, SemanticMatcher,
//! };
//!
//! let config = CrawlConfig::default();
//! let store = Arc::new(MemoryStore::new());
//! let orchestrator = CrawlOrchestrator::new(
//!     Arc::new(HttpFetcher::from_config(&config)?),
//!     store.clone(),
//!     PolicyRecordBuilder::default(),
//!     config,
//! );
//! let report = orchestrator
//!     .crawl(&[CrawlTarget::new("https://www.xuhui.gov.cn/zcwj/1.html").with_region("上海市徐汇区")])
//!     .await;
//!
//! let corpus = store.snapshot()?;
//! let outcome = SemanticMatcher::new(MatchConfig::default())
//!     .match_company(&company, &corpus, 5, 0.3)
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`extract`] - Text normalization and rule-based field extraction
//! - [`crawl`] - Fetchers and the crawl orchestrator
//! - [`matching`] - Heuristic scoring and semantic matching
//! - [`stores`] - Storage implementations (MemoryStore)
//! - [`traits`] - Seams for fetchers, stores, and AI services
//! - [`types`] - Records, profiles, config, and results
//! - [`testing`] - Mock implementations for testing

pub mod crawl;
pub mod error;
pub mod extract;
pub mod matching;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{FetchError, PilotError, Result, ServiceError, WorkerError};
pub use traits::{
    ai::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, Embedder, LanguageModel},
    fetcher::{PageFetcher, RawPage},
    store::{cosine_similarity, PolicyStore, UpsertOutcome, VectorIndex},
};
pub use types::{
    company::{
        Certification, CompanyProfile, CreditGrade, IndustryCategory, RdIntensity, ScaleClass,
    },
    config::{CrawlConfig, ExtractorConfig, MatchConfig, PilotConfig},
    matching::{MatchOutcome, MatchResult, ScoreSource, ScoredMatch, SemanticCapabilities},
    policy::{
        FieldProvenance, IdentityKey, PolicyFilter, PolicyRecord, PolicyTargeting, SupportType,
    },
    stats::CorpusStats,
};

pub use crawl::{
    CrawlOrchestrator, CrawlReport, CrawlTarget, ExtractionPool, FailureKind, HttpFetcher,
    TargetFailure,
};
pub use extract::{
    prepare_upsert, ExtractedFields, FieldExtractor, NormalizedPage, PageMetadata,
    PolicyRecordBuilder, TextNormalizer,
};
pub use matching::{HeuristicScorer, Recommender, SemanticMatcher};
pub use security::credentials::{LlmCredentials, SecretString};
pub use stores::MemoryStore;

#[cfg(feature = "openai")]
pub use ai::OpenAiService;
