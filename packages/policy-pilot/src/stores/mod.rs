//! Storage implementations for the policy corpus.
//!
//! Available backends:
//! - `MemoryStore` - In-memory corpus and vector index (always available)

pub mod memory;

pub use memory::MemoryStore;
