//! Recommendation text for match results.

use chrono::NaiveDate;

use crate::types::company::{Certification, CompanyProfile, IndustryCategory};
use crate::types::policy::{PolicyRecord, SupportType};

/// Score bands, highest first.
const SCORE_BANDS: &[(f64, &str)] = &[
    (0.8, "您的企业与此政策高度匹配！建议优先申请。"),
    (0.6, "您的企业与此政策匹配良好。建议准备相关材料并咨询具体申请要求。"),
    (0.4, "您的企业与此政策有一定匹配度。建议详细了解申请条件，看是否可以通过调整来提高匹配度。"),
];

const LOW_MATCH: &str = "此政策与您的企业匹配度较低，建议关注其他更适合的政策机会。";

/// Builds recommendation text from score, profile and policy.
///
/// Without a reference date the output depends only on its inputs; with one,
/// deadline reminders are added.
#[derive(Debug, Clone, Default)]
pub struct Recommender {
    reference_date: Option<NaiveDate>,
}

impl Recommender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Date used to compute days left until the deadline.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn recommend(
        &self,
        company: &CompanyProfile,
        policy: &PolicyRecord,
        score: f64,
        missing: &[String],
    ) -> String {
        let mut parts = vec![band_text(score, company.industry)];

        if let Some(advice) = support_advice(policy.support_type) {
            parts.push(advice.to_string());
        }
        if let Some(days) = self
            .reference_date
            .and_then(|today| policy.days_until_deadline(today))
        {
            if let Some(advice) = deadline_advice(days) {
                parts.push(advice);
            }
        }
        parts.extend(profile_advice(company).into_iter().map(str::to_string));
        if missing.iter().any(|m| m.contains("信用")) {
            parts.push("建议先完善企业信用记录，再启动申报。".to_string());
        }
        if policy.provenance.max_amount_defaulted {
            parts.push("资助金额未在原文中明确，请以政策原文为准。".to_string());
        }
        if policy.provenance.deadline_defaulted {
            parts.push("申报截止时间未在原文中明确，请以政策原文为准。".to_string());
        }

        parts.join(" ")
    }
}

/// Lead sentence for a score.
pub fn band_text(score: f64, industry: IndustryCategory) -> String {
    match SCORE_BANDS.iter().find(|(floor, _)| score >= *floor) {
        Some((floor, text)) if *floor >= 0.8 => {
            format!("{text}特别是您的{}背景非常符合政策要求。", industry.label_zh())
        }
        Some((_, text)) => text.to_string(),
        None => LOW_MATCH.to_string(),
    }
}

/// Preparation advice per support type.
pub fn support_advice(support_type: SupportType) -> Option<&'static str> {
    match support_type {
        SupportType::Grant => Some("无偿资助政策：重点准备项目实施方案、预算明细和技术路线图。"),
        SupportType::Subsidy => Some("补贴政策：准备相关支出凭证和财务审计报告，确保资金用途符合政策规定。"),
        SupportType::Tax => Some("税收优惠政策：准备研发费用归集、知识产权证明等材料。"),
        SupportType::Loan => Some("融资支持政策：准备完整的财务报表、资信证明和担保材料。"),
        SupportType::Investment => Some("投资政策：准备详细的商业计划书和团队介绍。"),
        SupportType::Other => None,
    }
}

/// Reminder by days left; nothing when the deadline is far away.
pub fn deadline_advice(days_left: i64) -> Option<String> {
    match days_left {
        d if d < 0 => Some("该政策本轮申报已截止，可关注后续批次。".to_string()),
        d if d <= 30 => Some(format!("申报截止时间仅剩{d}天，请抓紧准备材料！")),
        d if d <= 90 => Some(format!("申报截止时间还有{d}天，建议尽快启动申报准备工作。")),
        _ => None,
    }
}

fn profile_advice(company: &CompanyProfile) -> Vec<&'static str> {
    let mut advice = Vec::new();
    if company.certification == Certification::HighTech {
        advice.push("作为高新技术企业，您在税收优惠和科技项目申报方面有显著优势。");
    }
    if company.patents >= 5 {
        advice.push("您的知识产权储备丰富，在创新类政策申报中具有竞争优势。");
    }
    if company.industry == IndustryCategory::Ai {
        advice.push("AI产业是当前政策重点支持领域，建议关注相关专项政策。");
    }
    advice
}
