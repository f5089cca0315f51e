//! Semantic matching with per-candidate heuristic fallback.
//!
//! Flow for one company:
//! 1. Shortlist `top_k * shortlist_factor` candidates, by vector retrieval
//!    when an embedder and index are configured, else by heuristic score.
//! 2. Ask the language model to assess each candidate. Any failure (timeout,
//!    transport, malformed or out-of-range reply) keeps the exact heuristic
//!    result for that candidate.
//! 3. Filter by `min_score`, sort descending (stable), truncate to `top_k`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::heuristic::HeuristicScorer;
use super::prompts::{assessment_request, describe_company, parse_assessment};
use crate::error::{Result, ServiceError, ServiceResult};
use crate::traits::ai::{Embedder, LanguageModel};
use crate::traits::store::VectorIndex;
use crate::types::company::CompanyProfile;
use crate::types::config::MatchConfig;
use crate::types::matching::{MatchOutcome, MatchResult, ScoredMatch, SemanticCapabilities};
use crate::types::policy::PolicyRecord;

/// Matcher combining optional semantic services with the heuristic scorer.
pub struct SemanticMatcher {
    scorer: HeuristicScorer,
    config: MatchConfig,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl SemanticMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            scorer: HeuristicScorer::new(),
            config,
            embedder: None,
            index: None,
            model: None,
        }
    }

    pub fn with_scorer(mut self, scorer: HeuristicScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn capabilities(&self) -> SemanticCapabilities {
        SemanticCapabilities {
            embedding: self.embedder.is_some(),
            index: self.index.is_some(),
            language_model: self.model.is_some(),
        }
    }

    pub async fn match_company(
        &self,
        company: &CompanyProfile,
        corpus: &[PolicyRecord],
        top_k: usize,
        min_score: f64,
    ) -> Result<MatchOutcome> {
        self.match_with_cancel(company, corpus, top_k, min_score, &CancellationToken::new())
            .await
    }

    /// Match `company` against `corpus`.
    ///
    /// Only an invalid profile or invalid arguments fail; every service
    /// failure degrades to the heuristic result. On cancellation the results
    /// finished so far are returned with `cancelled = true`.
    #[instrument(skip(self, company, corpus, cancel), fields(company = %company.name, corpus = corpus.len()))]
    pub async fn match_with_cancel(
        &self,
        company: &CompanyProfile,
        corpus: &[PolicyRecord],
        top_k: usize,
        min_score: f64,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome> {
        company.validate()?;
        let run = self
            .config
            .clone()
            .with_top_k(top_k)
            .with_min_score(min_score);
        run.validate()?;

        let capabilities = self.capabilities();
        let candidates = self.shortlist(company, corpus, run.shortlist_size()).await;

        let mut outcome = MatchOutcome {
            matches: Vec::with_capacity(candidates.len()),
            capabilities,
            candidates_considered: candidates.len(),
            fallbacks: 0,
            cancelled: false,
        };

        for policy in candidates {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            let heuristic = self.scorer.evaluate(company, policy);
            let Some(model) = &self.model else {
                outcome.matches.push(ScoredMatch::Heuristic(heuristic));
                continue;
            };

            let assessed = tokio::select! {
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                result = self.assess(model.as_ref(), company, policy, &heuristic) => result,
            };

            match assessed {
                Ok(result) => outcome.matches.push(ScoredMatch::Semantic(result)),
                Err(e) => {
                    warn!(policy_id = %policy.id, error = %e, "semantic assessment failed, using heuristic score");
                    outcome.fallbacks += 1;
                    outcome.matches.push(ScoredMatch::Heuristic(heuristic));
                }
            }
        }

        outcome.matches.retain(|m| m.score() >= min_score);
        outcome.matches.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(Ordering::Equal)
        });
        outcome.matches.truncate(top_k);

        info!(
            candidates = outcome.candidates_considered,
            matches = outcome.matches.len(),
            fallbacks = outcome.fallbacks,
            cancelled = outcome.cancelled,
            "match complete"
        );
        Ok(outcome)
    }

    /// Candidates for assessment: retrieval when possible, heuristic otherwise.
    async fn shortlist<'a>(
        &self,
        company: &CompanyProfile,
        corpus: &'a [PolicyRecord],
        size: usize,
    ) -> Vec<&'a PolicyRecord> {
        match self.retrieve(company, corpus, size).await {
            Ok(found) if !found.is_empty() => {
                debug!(candidates = found.len(), "shortlist from vector retrieval");
                return found;
            }
            Ok(_) => debug!("vector retrieval returned no corpus records"),
            Err(e) => debug!(reason = %e, "vector retrieval unavailable"),
        }

        let mut scored: Vec<(f64, &PolicyRecord)> = corpus
            .iter()
            .map(|policy| (self.scorer.score(company, policy).score, policy))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.into_iter().take(size).map(|(_, policy)| policy).collect()
    }

    async fn retrieve<'a>(
        &self,
        company: &CompanyProfile,
        corpus: &'a [PolicyRecord],
        size: usize,
    ) -> ServiceResult<Vec<&'a PolicyRecord>> {
        let (Some(embedder), Some(index)) = (&self.embedder, &self.index) else {
            return Err(ServiceError::Unavailable(
                "embedder or vector index not configured".into(),
            ));
        };

        let query = describe_company(company);
        let embedding = tokio::time::timeout(self.config.embed_timeout(), embedder.embed(&query))
            .await
            .map_err(|_| ServiceError::Timeout)??;

        let hits = index
            .query(&embedding, size)
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let by_id: HashMap<&str, &PolicyRecord> =
            corpus.iter().map(|p| (p.id.as_str(), p)).collect();
        Ok(hits
            .iter()
            .filter_map(|(id, _)| by_id.get(id.as_str()).copied())
            .collect())
    }

    async fn assess(
        &self,
        model: &dyn LanguageModel,
        company: &CompanyProfile,
        policy: &PolicyRecord,
        heuristic: &MatchResult,
    ) -> ServiceResult<MatchResult> {
        let request = assessment_request(company, policy, &self.config);
        let response = tokio::time::timeout(self.config.llm_timeout(), model.complete(request))
            .await
            .map_err(|_| ServiceError::Timeout)??;

        let assessment = parse_assessment(&response.content)?;
        let recommendation = if assessment.recommendation.trim().is_empty() {
            heuristic.recommendation.clone()
        } else {
            assessment.recommendation
        };

        Ok(MatchResult::for_policy(
            policy,
            assessment.match_score,
            assessment.matched_requirements,
            assessment.missing_requirements,
            recommendation,
        ))
    }
}
