//! Match results and the tagged scoring outcome.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::policy::{PolicyRecord, SupportType};

/// Score of one company against one policy, plus display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub policy_id: String,
    pub policy_title: String,

    /// In [0,1]
    pub match_score: f64,

    pub matched_requirements: Vec<String>,
    pub missing_requirements: Vec<String>,
    pub recommendation: String,

    pub support_type: SupportType,
    pub max_amount: Option<u64>,
    pub deadline: Option<NaiveDate>,
    pub source_url: String,
}

impl MatchResult {
    /// Result for `policy` with display fields echoed from the record.
    pub fn for_policy(
        policy: &PolicyRecord,
        match_score: f64,
        matched_requirements: Vec<String>,
        missing_requirements: Vec<String>,
        recommendation: String,
    ) -> Self {
        Self {
            policy_id: policy.id.clone(),
            policy_title: policy.title.clone(),
            match_score: clamp_score(match_score),
            matched_requirements,
            missing_requirements,
            recommendation,
            support_type: policy.support_type,
            max_amount: policy.max_amount,
            deadline: policy.deadline,
            source_url: policy.source_url.clone(),
        }
    }
}

/// Clamp into [0,1], mapping NaN to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Which scoring path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Heuristic,
    Semantic,
}

/// A match result tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "result", rename_all = "lowercase")]
pub enum ScoredMatch {
    Heuristic(MatchResult),
    Semantic(MatchResult),
}

impl ScoredMatch {
    pub fn result(&self) -> &MatchResult {
        match self {
            Self::Heuristic(r) | Self::Semantic(r) => r,
        }
    }

    pub fn into_result(self) -> MatchResult {
        match self {
            Self::Heuristic(r) | Self::Semantic(r) => r,
        }
    }

    pub fn source(&self) -> ScoreSource {
        match self {
            Self::Heuristic(_) => ScoreSource::Heuristic,
            Self::Semantic(_) => ScoreSource::Semantic,
        }
    }

    pub fn score(&self) -> f64 {
        self.result().match_score
    }
}

/// Which semantic services were configured for a match run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticCapabilities {
    pub embedding: bool,
    pub index: bool,
    pub language_model: bool,
}

impl SemanticCapabilities {
    /// Vector retrieval needs both an embedder and an index.
    pub fn can_retrieve(&self) -> bool {
        self.embedding && self.index
    }

    /// No semantic service at all; every result is heuristic.
    pub fn heuristic_only(&self) -> bool {
        !self.language_model && !self.can_retrieve()
    }
}

/// Output of a match run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matches: Vec<ScoredMatch>,
    pub capabilities: SemanticCapabilities,

    /// Candidates considered before filtering
    pub candidates_considered: usize,

    /// Candidates that fell back to the heuristic score
    pub fallbacks: usize,

    /// Run was cancelled; `matches` holds what finished
    pub cancelled: bool,
}

impl MatchOutcome {
    pub fn results(&self) -> impl Iterator<Item = &MatchResult> {
        self.matches.iter().map(ScoredMatch::result)
    }
}
