//! Typed errors for the policy-pilot library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only caller-contract
//! violations, storage and configuration failures reach the caller; fetch
//! failures land in the crawl report, and extraction gaps and semantic-service
//! failures are absorbed by their components.

use thiserror::Error;

/// Errors surfaced to callers of the library.
#[derive(Debug, Error)]
pub enum PilotError {
    /// Company profile failed validation
    #[error("invalid company profile: {reason}")]
    InvalidProfile { reason: String },

    /// Invalid argument (e.g. `top_k = 0`, `min_score` outside [0,1])
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl PilotError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn lock_poisoned() -> Self {
        Self::Storage("store lock poisoned".into())
    }
}

/// Errors fetching a single page.
///
/// Each one is recorded against its target. Everything except
/// [`FetchError::Transport`] lets the crawl move on to the next target.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Fetch exceeded its time budget
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The fetcher itself cannot operate (client construction, runtime gone)
    #[error("transport unavailable: {0}")]
    Transport(String),
}

impl FetchError {
    /// Whether this error should abort the whole crawl.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Failures of the bounded extraction pool. Recorded against one target.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("extraction pool closed")]
    Closed,

    #[error("extraction worker panicked: {0}")]
    Panicked(String),

    #[error("extraction worker cancelled")]
    Cancelled,
}

/// Failures of the embedding, index, or language-model services.
///
/// Never surfaced: each one downgrades a candidate to the heuristic score.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service timed out")]
    Timeout,

    #[error("service returned status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, PilotError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for semantic service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
