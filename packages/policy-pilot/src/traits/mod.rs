//! Trait seams for the pluggable collaborators.
//!
//! Fetching, storage, vector retrieval, and the language model are all
//! injected so the pipeline runs the same against mocks and real services.

pub mod ai;
pub mod fetcher;
pub mod store;
