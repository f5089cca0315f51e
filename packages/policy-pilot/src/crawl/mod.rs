//! Fetching policy pages and turning them into stored records.

pub mod http;
pub mod orchestrator;

pub use http::HttpFetcher;
pub use orchestrator::{
    CrawlOrchestrator, CrawlReport, CrawlTarget, ExtractionPool, FailureKind, ProcessedPage,
    TargetFailure,
};
