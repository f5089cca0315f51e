//! Deterministic weighted scorer.
//!
//! | Factor       | Weight |
//! |--------------|--------|
//! | Jurisdiction | 25     |
//! | Industry     | 30     |
//! | Scale        | 20     |
//! | R&D          | 15     |
//! | Credit       | 10     |
//!
//! The weighted sum is normalized to [0,1] and blended 70/30 with the
//! policy's base score.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use super::recommend::Recommender;
use crate::types::company::{
    CompanyProfile, CreditGrade, IndustryCategory, RdIntensity, ScaleClass,
};
use crate::types::matching::{clamp_score, MatchResult};
use crate::types::policy::PolicyRecord;

const WEIGHTED_SHARE: f64 = 0.7;
const BASE_SHARE: f64 = 0.3;

/// One scoring dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Jurisdiction,
    Industry,
    Scale,
    Rd,
    Credit,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Jurisdiction,
        Factor::Industry,
        Factor::Scale,
        Factor::Rd,
        Factor::Credit,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            Self::Jurisdiction => 25.0,
            Self::Industry => 30.0,
            Self::Scale => 20.0,
            Self::Rd => 15.0,
            Self::Credit => 10.0,
        }
    }
}

/// Points one factor earned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: Factor,
    pub points: f64,
}

impl FactorScore {
    fn full(factor: Factor) -> Self {
        Self::share(factor, 1.0)
    }

    fn share(factor: Factor, share: f64) -> Self {
        Self {
            factor,
            points: factor.weight() * share,
        }
    }

    fn points(factor: Factor, points: f64) -> Self {
        Self { factor, points }
    }

    pub fn is_full(&self) -> bool {
        self.points >= self.factor.weight()
    }

    /// Fraction of the factor weight earned.
    pub fn ratio(&self) -> f64 {
        self.points / self.factor.weight()
    }
}

/// Heuristic score with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicScore {
    /// Blended score in [0,1]
    pub score: f64,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub factors: Vec<FactorScore>,
}

impl HeuristicScore {
    pub fn factor(&self, factor: Factor) -> Option<&FactorScore> {
        self.factors.iter().find(|f| f.factor == factor)
    }

    /// Sum of earned points out of 100.
    pub fn points(&self) -> f64 {
        self.factors.iter().map(|f| f.points).sum()
    }
}

/// Words a policy tag must contain to count as the company's industry.
fn industry_keywords(industry: IndustryCategory) -> &'static [&'static str] {
    match industry {
        IndustryCategory::Ai => &["人工智能", "智能", "ai", "算法", "大模型"],
        IndustryCategory::Tech => &["科技", "技术", "创新"],
        IndustryCategory::Software => &["软件", "信息", "数字"],
        IndustryCategory::Manufacturing => &["制造", "生产", "工业"],
        IndustryCategory::Service => &["服务", "商业", "文创"],
        IndustryCategory::Biotech => &["生物", "医药", "医疗"],
        IndustryCategory::NewEnergy => &["新能源", "能源", "光伏", "储能"],
        IndustryCategory::Other => &[],
    }
}

/// Deterministic company/policy scorer. Pure apart from the optional
/// reference date used for deadline advice.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    recommender: Recommender,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recommender(mut self, recommender: Recommender) -> Self {
        self.recommender = recommender;
        self
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    pub fn score(&self, company: &CompanyProfile, policy: &PolicyRecord) -> HeuristicScore {
        let factors = vec![
            jurisdiction_factor(company, policy),
            industry_factor(company, policy),
            scale_factor(company, policy),
            rd_factor(company, policy),
            credit_factor(company),
        ];

        let points: f64 = factors.iter().map(|f| f.points).sum();
        let total: f64 = Factor::ALL.iter().map(Factor::weight).sum();
        let weighted = (points / total).min(1.0);
        let score = clamp_score(WEIGHTED_SHARE * weighted + BASE_SHARE * policy.targeting.base_score);

        let jurisdiction_full = factors[0].is_full();
        let (matched, missing) = bucket_requirements(company, policy, jurisdiction_full);

        HeuristicScore {
            score,
            matched,
            missing,
            factors,
        }
    }

    pub fn evaluate(&self, company: &CompanyProfile, policy: &PolicyRecord) -> MatchResult {
        let scored = self.score(company, policy);
        let recommendation =
            self.recommender
                .recommend(company, policy, scored.score, &scored.missing);
        MatchResult::for_policy(
            policy,
            scored.score,
            scored.matched,
            scored.missing,
            recommendation,
        )
    }

    /// Score every policy, keep those at or above `min_score`, best first.
    ///
    /// Ties keep corpus order.
    pub fn rank<'a>(
        &self,
        company: &CompanyProfile,
        corpus: impl IntoIterator<Item = &'a PolicyRecord>,
        top_k: usize,
        min_score: f64,
    ) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = corpus
            .into_iter()
            .map(|policy| self.evaluate(company, policy))
            .filter(|r| r.match_score >= min_score)
            .collect();
        sort_by_score(&mut results);
        results.truncate(top_k);

        debug!(company = %company.name, results = results.len(), "heuristic rank complete");
        results
    }
}

/// Stable descending sort by score.
pub(crate) fn sort_by_score(results: &mut [MatchResult]) {
    results.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(Ordering::Equal)
    });
}

fn jurisdiction_factor(company: &CompanyProfile, policy: &PolicyRecord) -> FactorScore {
    let factor = Factor::Jurisdiction;
    if policy.is_national() {
        return FactorScore::full(factor);
    }

    let policy_region = policy.region.trim();
    let location = company.jurisdiction.trim();
    if policy_region.is_empty() || location.is_empty() {
        return FactorScore::share(factor, 0.2);
    }
    if location.contains(policy_region) || policy_region.contains(location) {
        return FactorScore::full(factor);
    }
    if is_within_region(location, policy_region) {
        return FactorScore::share(factor, 0.8);
    }
    FactorScore::share(factor, 0.2)
}

/// A district/county location inside a province/city level policy region,
/// e.g. 上海徐汇区 under 上海市.
fn is_within_region(location: &str, policy_region: &str) -> bool {
    let is_upper_level = policy_region.ends_with(['省', '市']);
    let is_sub_level = location.contains(['区', '县']);
    if !is_upper_level || !is_sub_level {
        return false;
    }
    let stem = policy_region.trim_end_matches(['省', '市']);
    stem.chars().count() >= 2 && location.contains(stem)
}

fn industry_factor(company: &CompanyProfile, policy: &PolicyRecord) -> FactorScore {
    let factor = Factor::Industry;
    let keywords = industry_keywords(company.industry);
    let intersects = policy.industry_tags.iter().any(|tag| {
        let tag = tag.to_lowercase();
        keywords.iter().any(|kw| tag.contains(kw))
    });

    if intersects {
        FactorScore::full(factor)
    } else if company.industry.is_generic_tech() {
        FactorScore::share(factor, 0.5)
    } else {
        FactorScore::points(factor, 5.0)
    }
}

/// Micro and startup companies are assessed as small.
fn assessed_scale(scale: ScaleClass) -> ScaleClass {
    match scale {
        ScaleClass::Micro | ScaleClass::Startup => ScaleClass::Small,
        other => other,
    }
}

fn scale_factor(company: &CompanyProfile, policy: &PolicyRecord) -> FactorScore {
    let factor = Factor::Scale;
    let targets = &policy.targeting.target_scales;
    if targets.is_empty()
        || targets.contains(&company.scale)
        || targets.contains(&assessed_scale(company.scale))
    {
        FactorScore::full(factor)
    } else {
        FactorScore::share(factor, 0.5)
    }
}

fn rd_factor(company: &CompanyProfile, policy: &PolicyRecord) -> FactorScore {
    let factor = Factor::Rd;
    let targets = &policy.targeting.target_rd;
    if targets.is_empty() || targets.contains(&company.rd) {
        FactorScore::full(factor)
    } else if company.rd == RdIntensity::Medium && targets.contains(&RdIntensity::High) {
        FactorScore::points(factor, 10.0)
    } else {
        FactorScore::points(factor, 5.0)
    }
}

fn credit_factor(company: &CompanyProfile) -> FactorScore {
    let factor = Factor::Credit;
    match company.credit_grade() {
        CreditGrade::Good => FactorScore::full(factor),
        CreditGrade::Fair => FactorScore::share(factor, 0.8),
        CreditGrade::Poor => FactorScore::share(factor, 0.5),
    }
}

/// Split policy requirements into matched and missing by keyword.
///
/// Requirements no rule recognizes count as matched.
fn bucket_requirements(
    company: &CompanyProfile,
    policy: &PolicyRecord,
    jurisdiction_full: bool,
) -> (Vec<String>, Vec<String>) {
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for requirement in &policy.requirements {
        let satisfied = if requirement.contains("注册") {
            jurisdiction_full
        } else if requirement.contains("人工智能") || requirement.contains("AI") {
            company.industry == IndustryCategory::Ai
        } else if requirement.contains("信用") {
            company.credit_grade() == CreditGrade::Good
        } else {
            true
        };

        if satisfied {
            matched.push(requirement.clone());
        } else {
            missing.push(requirement.clone());
        }
    }

    (matched, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_company, sample_policy};
    use crate::types::policy::PolicyTargeting;

    #[test]
    fn test_full_match_beats_base_score() {
        let mut policy = sample_policy("徐汇区AI扶持办法");
        policy.targeting = PolicyTargeting::default().with_base_score(0.85);
        let company = sample_company().with_credit_status("good");

        let scored = HeuristicScorer::new().score(&company, &policy);

        assert_eq!(scored.points(), 100.0);
        assert!(scored.score >= 0.85);
        assert!((scored.score - (0.7 + 0.3 * 0.85)).abs() < 1e-9);
        assert!(scored.missing.is_empty());
    }

    #[test]
    fn test_district_only_jurisdiction_matches_by_substring() {
        let policy = sample_policy("徐汇区AI扶持办法");
        let mut company = sample_company();
        company.jurisdiction = "徐汇区".into();

        let scored = HeuristicScorer::new().score(&company, &policy);
        assert!(scored.factor(Factor::Jurisdiction).unwrap().is_full());
    }

    #[test]
    fn test_out_of_region_gets_baseline() {
        let policy = sample_policy("徐汇区AI扶持办法");
        let mut company = sample_company();
        company.jurisdiction = "北京市海淀区".into();

        let scored = HeuristicScorer::new().score(&company, &policy);
        let jurisdiction = scored.factor(Factor::Jurisdiction).unwrap();
        assert_eq!(jurisdiction.points, 5.0);
        assert!((jurisdiction.ratio() - 0.2).abs() < 1e-9);
        assert_eq!(scored.missing, ["企业注册地在徐汇区"]);
    }

    #[test]
    fn test_city_policy_for_district_company() {
        let mut policy = sample_policy("上海市科技创新政策");
        policy.region = "上海市".into();
        let mut company = sample_company();
        company.jurisdiction = "上海徐汇区".into();

        let scored = HeuristicScorer::new().score(&company, &policy);
        assert_eq!(scored.factor(Factor::Jurisdiction).unwrap().points, 20.0);
    }

    #[test]
    fn test_national_policy_is_full() {
        let mut policy = sample_policy("全国性政策");
        policy.region = "全国".into();
        let mut company = sample_company();
        company.jurisdiction = "广东省深圳市南山区".into();

        let scored = HeuristicScorer::new().score(&company, &policy);
        assert!(scored.factor(Factor::Jurisdiction).unwrap().is_full());
    }

    #[test]
    fn test_industry_tiers() {
        let policy = sample_policy("徐汇区AI扶持办法");
        let scorer = HeuristicScorer::new();

        let mut company = sample_company();
        company.industry = IndustryCategory::Software;
        let mut manufacturing = policy.clone();
        manufacturing.industry_tags = vec!["制造业".into()];
        assert_eq!(
            scorer.score(&company, &manufacturing).factor(Factor::Industry).unwrap().points,
            15.0
        );

        company.industry = IndustryCategory::Service;
        assert_eq!(
            scorer.score(&company, &manufacturing).factor(Factor::Industry).unwrap().points,
            5.0
        );

        company.industry = IndustryCategory::Manufacturing;
        assert!(scorer
            .score(&company, &manufacturing)
            .factor(Factor::Industry)
            .unwrap()
            .is_full());
    }

    #[test]
    fn test_scale_and_rd() {
        let policy = sample_policy("徐汇区AI扶持办法");
        let scorer = HeuristicScorer::new();

        let mut company = sample_company();
        company.scale = ScaleClass::Micro;
        company.rd = RdIntensity::Low;
        let scored = scorer.score(&company, &policy);
        assert!(scored.factor(Factor::Scale).unwrap().is_full());
        assert_eq!(scored.factor(Factor::Rd).unwrap().points, 5.0);

        company.rd = RdIntensity::Medium;
        let mut high_only = policy.clone();
        high_only.targeting = PolicyTargeting::default().with_rd([RdIntensity::High]);
        assert_eq!(
            scorer.score(&company, &high_only).factor(Factor::Rd).unwrap().points,
            10.0
        );

        let mut large_only = policy.clone();
        large_only.targeting = PolicyTargeting::default().with_scales([ScaleClass::Large]);
        assert_eq!(
            scorer.score(&company, &large_only).factor(Factor::Scale).unwrap().points,
            10.0
        );
    }

    #[test]
    fn test_empty_targets_are_unrestricted() {
        let mut policy = sample_policy("不限规模");
        policy.targeting = PolicyTargeting::default()
            .with_scales([])
            .with_rd([]);
        let mut company = sample_company();
        company.scale = ScaleClass::Micro;
        company.rd = RdIntensity::None;

        let scored = HeuristicScorer::new().score(&company, &policy);
        assert!(scored.factor(Factor::Scale).unwrap().is_full());
        assert!(scored.factor(Factor::Rd).unwrap().is_full());
    }

    #[test]
    fn test_credit_tiers() {
        let policy = sample_policy("信用测试");
        let scorer = HeuristicScorer::new();
        let points = |status: &str| {
            scorer
                .score(&sample_company().with_credit_status(status), &policy)
                .factor(Factor::Credit)
                .unwrap()
                .points
        };
        assert_eq!(points("良好"), 10.0);
        assert_eq!(points("一般"), 8.0);
        assert_eq!(points("失信"), 5.0);
    }

    #[test]
    fn test_requirement_buckets() {
        let mut policy = sample_policy("要求测试");
        policy.requirements = vec![
            "企业注册地在徐汇区".into(),
            "从事人工智能相关业务".into(),
            "企业信用状况良好".into(),
            "具有独立法人资格".into(),
        ];
        let mut company = sample_company().with_credit_status("一般");
        company.industry = IndustryCategory::Biotech;

        let scored = HeuristicScorer::new().score(&company, &policy);
        assert_eq!(scored.matched, ["企业注册地在徐汇区", "具有独立法人资格"]);
        assert_eq!(scored.missing, ["从事人工智能相关业务", "企业信用状况良好"]);
    }

    #[test]
    fn test_ai_requirement_needs_uppercase_ai() {
        let mut policy = sample_policy("要求测试");
        policy.requirements = vec![
            "具备AI大模型研发能力".into(),
            "maintain a registered domain".into(),
        ];
        let mut company = sample_company();
        company.industry = IndustryCategory::Biotech;

        let scored = HeuristicScorer::new().score(&company, &policy);
        assert_eq!(scored.matched, ["maintain a registered domain"]);
        assert_eq!(scored.missing, ["具备AI大模型研发能力"]);
    }

    #[test]
    fn test_rank_filters_sorts_and_truncates() {
        let company = sample_company();
        let mut strong = sample_policy("强匹配");
        strong.targeting = PolicyTargeting::default().with_base_score(0.95);
        let mut weak = sample_policy("弱匹配");
        weak.region = "北京市海淀区".into();
        weak.industry_tags = vec!["住房保障".into()];
        weak.targeting = PolicyTargeting::default().with_base_score(0.0);
        let middle = sample_policy("中等匹配");

        let corpus = vec![weak, middle, strong];
        let ranked = HeuristicScorer::new().rank(&company, &corpus, 2, 0.3);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].policy_title, "强匹配");
        assert_eq!(ranked[1].policy_title, "中等匹配");
        assert!(ranked[0].match_score >= ranked[1].match_score);
    }

    #[test]
    fn test_evaluate_echoes_policy_fields() {
        let policy = sample_policy("展示字段");
        let result = HeuristicScorer::new().evaluate(&sample_company(), &policy);
        assert_eq!(result.policy_id, policy.id);
        assert_eq!(result.max_amount, Some(500_000));
        assert_eq!(result.source_url, policy.source_url);
        assert!(!result.recommendation.is_empty());
    }
}
