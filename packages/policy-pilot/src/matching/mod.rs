//! Company-to-policy matching.
//!
//! [`HeuristicScorer`] is deterministic and always available.
//! [`SemanticMatcher`] layers optional retrieval and language-model
//! assessment on top, falling back per candidate.

pub mod heuristic;
pub mod prompts;
pub mod recommend;
pub mod semantic;

pub use heuristic::{Factor, FactorScore, HeuristicScore, HeuristicScorer};
pub use prompts::{describe_company, parse_assessment, Assessment};
pub use recommend::Recommender;
pub use semantic::SemanticMatcher;
