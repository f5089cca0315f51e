//! Prompt rendering and reply parsing for the semantic assessment.

use serde::Deserialize;

use crate::error::{ServiceError, ServiceResult};
use crate::traits::ai::{ChatMessage, CompletionRequest};
use crate::types::company::{Certification, CompanyProfile};
use crate::types::config::MatchConfig;
use crate::types::policy::PolicyRecord;

pub const SYSTEM_PROMPT: &str =
    "你是一个专业的政策分析师，擅长分析企业与政策的匹配度。请严格按照JSON格式返回分析结果。";

/// One-line profile description, also used as the retrieval query.
pub fn describe_company(company: &CompanyProfile) -> String {
    let mut parts = vec![
        format!("企业名称：{}", company.name),
        format!("注册地：{}", company.jurisdiction),
        format!("产业类型：{}", company.industry.label_zh()),
        format!("企业规模：{}", company.scale.label_zh()),
        format!("研发投入占比：{}", company.rd.label_zh()),
    ];
    if company.patents > 0 {
        parts.push(format!("专利数量：{}", company.patents));
    }
    if company.certification != Certification::None {
        parts.push(format!("企业认定：{}", company.certification.label_zh()));
    }
    parts.join("；")
}

pub fn user_prompt(company: &CompanyProfile, policy: &PolicyRecord) -> String {
    let or_unknown = |s: &str| if s.trim().is_empty() { "未知".to_string() } else { s.to_string() };

    format!(
        r#"请分析以下企业与政策的匹配度：

**企业信息：**
- 企业名称：{name}
- 注册地：{jurisdiction}
- 产业类型：{industry}
- 企业规模：{scale}
- 研发投入占比：{rd}
- 专利数量：{patents}
- 企业认定：{certification}
- 经营状态：{operating}
- 信用状态：{credit}

**政策信息：**
- 政策名称：{title}
- 适用地区：{region}
- 产业标签：{tags}
- 申请要求：{requirements}
- 支持类型：{support}
- 最高金额：{amount}

请返回JSON格式的分析结果，包含以下字段：
{{
    "match_score": 0.85,
    "matched_requirements": ["满足的要求1", "满足的要求2"],
    "missing_requirements": ["不满足的要求1"],
    "recommendation": "具体的申请建议和改进方向"
}}

match_score 为0到1之间的小数。

分析要点：
1. 根据企业的产业类型、规模、研发投入等与政策要求的匹配程度评分
2. 详细列出企业满足和不满足的具体要求
3. 提供实用的申请建议和改进建议"#,
        name = company.name,
        jurisdiction = company.jurisdiction,
        industry = company.industry.label_zh(),
        scale = company.scale.label_zh(),
        rd = company.rd.label_zh(),
        patents = company.patents,
        certification = company.certification.label_zh(),
        operating = or_unknown(&company.operating_status),
        credit = or_unknown(&company.credit_status),
        title = policy.title,
        region = policy.region,
        tags = policy.industry_tags.join("、"),
        requirements = policy.requirements.join("；"),
        support = policy.support_type.label_zh(),
        amount = policy.amount_label(),
    )
}

/// Chat request for assessing one company/policy pair.
pub fn assessment_request(
    company: &CompanyProfile,
    policy: &PolicyRecord,
    config: &MatchConfig,
) -> CompletionRequest {
    CompletionRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(company, policy)),
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Structured assessment returned by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assessment {
    pub match_score: f64,

    #[serde(default)]
    pub matched_requirements: Vec<String>,

    #[serde(default)]
    pub missing_requirements: Vec<String>,

    #[serde(default)]
    pub recommendation: String,
}

/// Pull the JSON object out of a reply that may carry code fences or prose.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();

    let fenced = trimmed.find("```").and_then(|start| {
        let after = start + 3;
        let body_start = trimmed[after..]
            .find('\n')
            .map(|i| after + i + 1)
            .unwrap_or(after);
        trimmed[body_start..]
            .find("```")
            .map(|end| trimmed[body_start..body_start + end].trim())
    });
    let candidate = fenced.unwrap_or(trimmed);

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    (end > start).then(|| &candidate[start..=end])
}

/// Parse and validate a model reply.
pub fn parse_assessment(reply: &str) -> ServiceResult<Assessment> {
    let json = extract_json_object(reply)
        .ok_or_else(|| ServiceError::Malformed("reply contains no JSON object".into()))?;
    let assessment: Assessment = serde_json::from_str(json)
        .map_err(|e| ServiceError::Malformed(format!("invalid assessment JSON: {e}")))?;

    if !assessment.match_score.is_finite() || !(0.0..=1.0).contains(&assessment.match_score) {
        return Err(ServiceError::Malformed(format!(
            "match_score out of range: {}",
            assessment.match_score
        )));
    }
    Ok(assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_company, sample_policy};

    #[test]
    fn test_describe_company() {
        let description = describe_company(&sample_company());
        assert!(description.starts_with("企业名称：上海智算科技有限公司；注册地：上海市徐汇区"));
        assert!(description.contains("专利数量：12"));
        assert!(description.contains("企业认定：高新技术企业"));

        let mut bare = sample_company();
        bare.patents = 0;
        bare.certification = Certification::None;
        let description = describe_company(&bare);
        assert!(!description.contains("专利数量"));
        assert!(!description.contains("企业认定"));
    }

    #[test]
    fn test_assessment_request_shape() {
        let request =
            assessment_request(&sample_company(), &sample_policy("提示词"), &MatchConfig::default());
        assert_eq!(request.model, "deepseek-chat");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert!(request.messages[1].content.contains("政策名称：提示词"));
        assert!(request.messages[1].content.contains("最高金额：50万元"));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"match_score\": 0.82, \"matched_requirements\": [\"注册地符合\"], \"missing_requirements\": [], \"recommendation\": \"建议申请\"}\n```";
        let assessment = parse_assessment(reply).unwrap();
        assert_eq!(assessment.match_score, 0.82);
        assert_eq!(assessment.matched_requirements, ["注册地符合"]);
    }

    #[test]
    fn test_parse_reply_with_prose() {
        let reply = "分析结果如下：{\"match_score\": 0.5} 以上仅供参考";
        let assessment = parse_assessment(reply).unwrap();
        assert_eq!(assessment.match_score, 0.5);
        assert!(assessment.recommendation.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_replies() {
        assert!(parse_assessment("无法分析").is_err());
        assert!(parse_assessment("{\"match_score\": 1.5}").is_err());
        assert!(parse_assessment("{\"match_score\": -0.1}").is_err());
        assert!(parse_assessment("{\"match_score\": \"high\"}").is_err());
        assert!(parse_assessment("{\"score\": 0.5}").is_err());
        assert!(parse_assessment("} {").is_err());
    }
}
