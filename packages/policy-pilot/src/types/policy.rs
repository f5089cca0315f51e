//! Policy records and corpus queries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use super::company::{RdIntensity, ScaleClass};

/// Kind of support a policy offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportType {
    Grant,
    Subsidy,
    Tax,
    Loan,
    Investment,
    Other,
}

impl SupportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Subsidy => "subsidy",
            Self::Tax => "tax",
            Self::Loan => "loan",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }

    /// Display label used in prompts and recommendation text.
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::Grant => "无偿资助",
            Self::Subsidy => "资金补贴",
            Self::Tax => "税收优惠",
            Self::Loan => "贷款贴息",
            Self::Investment => "股权投资",
            Self::Other => "其他支持",
        }
    }
}

impl fmt::Display for SupportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SupportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grant" | "无偿资助" => Ok(Self::Grant),
            "subsidy" | "补贴" | "资金补贴" => Ok(Self::Subsidy),
            "tax" | "税收优惠" => Ok(Self::Tax),
            "loan" | "贷款" | "贷款贴息" => Ok(Self::Loan),
            "investment" | "投资" | "股权投资" => Ok(Self::Investment),
            "other" | "其他" => Ok(Self::Other),
            other => Err(format!("unknown support type: {other}")),
        }
    }
}

/// Which fields were filled from documented defaults rather than found on the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    #[serde(default)]
    pub max_amount_defaulted: bool,
    #[serde(default)]
    pub deadline_defaulted: bool,
    #[serde(default)]
    pub department_defaulted: bool,
    #[serde(default)]
    pub requirements_defaulted: bool,
}

impl FieldProvenance {
    pub fn any_defaulted(&self) -> bool {
        self.max_amount_defaulted
            || self.deadline_defaulted
            || self.department_defaulted
            || self.requirements_defaulted
    }
}

/// Who a policy is aimed at, plus its intrinsic attractiveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTargeting {
    /// Accepted company scales; empty means unrestricted.
    #[serde(default)]
    pub target_scales: BTreeSet<ScaleClass>,

    /// Accepted R&D intensities; empty means unrestricted.
    #[serde(default)]
    pub target_rd: BTreeSet<RdIntensity>,

    /// Intrinsic attractiveness in [0,1].
    pub base_score: f64,
}

impl Default for PolicyTargeting {
    fn default() -> Self {
        Self {
            target_scales: [ScaleClass::Small, ScaleClass::Medium, ScaleClass::Large]
                .into_iter()
                .collect(),
            target_rd: [RdIntensity::Medium, RdIntensity::High].into_iter().collect(),
            base_score: 0.75,
        }
    }
}

impl PolicyTargeting {
    /// Set the base score, clamped into [0,1]. NaN becomes 0.
    pub fn with_base_score(mut self, base_score: f64) -> Self {
        self.base_score = if base_score.is_nan() {
            0.0
        } else {
            base_score.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_scales(mut self, scales: impl IntoIterator<Item = ScaleClass>) -> Self {
        self.target_scales = scales.into_iter().collect();
        self
    }

    pub fn with_rd(mut self, rd: impl IntoIterator<Item = RdIntensity>) -> Self {
        self.target_rd = rd.into_iter().collect();
        self
    }
}

/// Identity of a policy across crawls: normalized title plus source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub title: String,
    pub source_url: String,
}

impl IdentityKey {
    pub fn new(title: &str, source_url: &str) -> Self {
        Self {
            title: normalize_title(title),
            source_url: source_url.trim().to_string(),
        }
    }

    /// Stable record id: hex SHA-256 over the key.
    pub fn record_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.source_url.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Trim, drop any site-name suffix after `|`, and collapse whitespace runs.
pub fn normalize_title(title: &str) -> String {
    let head = title.split('|').next().unwrap_or(title);
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a region string denotes nationwide scope.
pub fn is_national(region: &str) -> bool {
    let region = region.trim();
    region.contains("全国") || region.contains("国家") || region.eq_ignore_ascii_case("national")
}

/// A structured policy announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Hex SHA-256 of the identity key
    pub id: String,

    pub title: String,

    /// Named jurisdiction, or 全国/national
    pub region: String,

    /// Category from the crawl target
    #[serde(default)]
    pub category: String,

    pub department: String,

    pub support_type: SupportType,

    /// Ceiling in whole yuan; `None` means no stated ceiling
    pub max_amount: Option<u64>,

    /// `None` means open-ended
    pub deadline: Option<NaiveDate>,

    #[serde(default)]
    pub industry_tags: Vec<String>,

    #[serde(default)]
    pub requirements: Vec<String>,

    #[serde(default)]
    pub raw_content: String,

    pub source_url: String,

    #[serde(default)]
    pub pdf_url: Option<String>,

    #[serde(default)]
    pub targeting: PolicyTargeting,

    #[serde(default)]
    pub provenance: FieldProvenance,

    pub crawl_time: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl PolicyRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.title, &self.source_url)
    }

    pub fn is_national(&self) -> bool {
        is_national(&self.region)
    }

    /// Deadline stated on the page; a placeholder filled by the extractor is not one.
    pub fn stated_deadline(&self) -> Option<NaiveDate> {
        self.deadline.filter(|_| !self.provenance.deadline_defaulted)
    }

    /// Open-ended or not yet past its stated deadline on `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.stated_deadline().map_or(true, |deadline| deadline >= date)
    }

    /// Days from `today` until the stated deadline (negative once passed).
    pub fn days_until_deadline(&self, today: NaiveDate) -> Option<i64> {
        self.stated_deadline().map(|d| (d - today).num_days())
    }

    /// Title plus the head of the body, as sent to the embedder.
    pub fn embedding_text(&self) -> String {
        let content: String = self.raw_content.chars().take(EMBED_CONTENT_CHARS).collect();
        format!("{}\n{}", self.title, content)
    }

    /// Human-readable ceiling, e.g. `50万元`.
    pub fn amount_label(&self) -> String {
        match self.max_amount {
            None => "不限".to_string(),
            Some(amount) if amount >= 100_000_000 && amount % 1_000_000 == 0 => {
                format_scaled(amount, 100_000_000, "亿元")
            }
            Some(amount) if amount >= 10_000 => format_scaled(amount, 10_000, "万元"),
            Some(amount) => format!("{amount}元"),
        }
    }
}

fn format_scaled(amount: u64, unit: u64, suffix: &str) -> String {
    let whole = amount / unit;
    let frac = amount % unit;
    if frac == 0 {
        format!("{whole}{suffix}")
    } else {
        let digits = unit.to_string().len() - 1;
        let frac = format!("{frac:0digits$}");
        format!("{whole}.{}{suffix}", frac.trim_end_matches('0'))
    }
}

/// Characters of body text embedded alongside the title.
const EMBED_CONTENT_CHARS: usize = 2000;

/// Filter for listing the corpus.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    /// Region substring; national policies always pass
    pub region: Option<String>,
    pub support_type: Option<SupportType>,
    /// Only policies still open on this date
    pub active_on: Option<NaiveDate>,
    pub tag: Option<String>,
}

impl PolicyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_support_type(mut self, support_type: SupportType) -> Self {
        self.support_type = Some(support_type);
        self
    }

    pub fn active_on(mut self, date: NaiveDate) -> Self {
        self.active_on = Some(date);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn matches(&self, record: &PolicyRecord) -> bool {
        if let Some(region) = &self.region {
            if !record.is_national() && !record.region.contains(region.as_str()) {
                return false;
            }
        }
        if let Some(support_type) = self.support_type {
            if record.support_type != support_type {
                return false;
            }
        }
        if let Some(date) = self.active_on {
            if !record.is_active_on(date) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !record.industry_tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_normalization_strips_site_suffix() {
        assert_eq!(
            normalize_title("  关于人工智能产业   扶持办法 | 徐汇区人民政府 "),
            "关于人工智能产业 扶持办法"
        );
    }

    #[test]
    fn test_identity_ignores_title_noise() {
        let a = IdentityKey::new("徐汇区AI扶持办法", "https://www.xuhui.gov.cn/a");
        let b = IdentityKey::new(" 徐汇区AI扶持办法 | 门户 ", "https://www.xuhui.gov.cn/a ");
        assert_eq!(a, b);
        assert_eq!(a.record_id(), b.record_id());
        assert_eq!(a.record_id().len(), 64);
    }

    #[test]
    fn test_identity_differs_by_url() {
        let a = IdentityKey::new("同名政策", "https://a.gov.cn/1");
        let b = IdentityKey::new("同名政策", "https://a.gov.cn/2");
        assert_ne!(a.record_id(), b.record_id());
    }

    #[test]
    fn test_is_national() {
        assert!(is_national("全国"));
        assert!(is_national("National"));
        assert!(!is_national("上海市徐汇区"));
    }

    #[test]
    fn test_amount_label() {
        let mut record = crate::testing::sample_policy("标签测试");
        record.max_amount = Some(500_000);
        assert_eq!(record.amount_label(), "50万元");
        record.max_amount = Some(15_000);
        assert_eq!(record.amount_label(), "1.5万元");
        record.max_amount = Some(200_000_000);
        assert_eq!(record.amount_label(), "2亿元");
        record.max_amount = None;
        assert_eq!(record.amount_label(), "不限");
    }

    #[test]
    fn test_targeting_base_score_clamped() {
        assert_eq!(PolicyTargeting::default().with_base_score(1.7).base_score, 1.0);
        assert_eq!(PolicyTargeting::default().with_base_score(f64::NAN).base_score, 0.0);
    }

    #[test]
    fn test_filter() {
        let mut record = crate::testing::sample_policy("筛选测试");
        record.region = "上海市徐汇区".into();
        record.deadline = NaiveDate::from_ymd_opt(2025, 6, 30);
        record.industry_tags = vec!["人工智能".into()];

        assert!(PolicyFilter::new().with_region("徐汇").matches(&record));
        assert!(!PolicyFilter::new().with_region("浦东").matches(&record));
        assert!(PolicyFilter::new().with_tag("人工智能").matches(&record));
        assert!(!PolicyFilter::new()
            .active_on(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
            .matches(&record));

        record.region = "全国".into();
        assert!(PolicyFilter::new().with_region("浦东").matches(&record));
    }

    #[test]
    fn test_placeholder_deadline_never_expires() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut record = crate::testing::sample_policy("截止时间未知");
        record.deadline = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert!(!record.is_active_on(today));

        record.provenance.deadline_defaulted = true;
        assert_eq!(record.stated_deadline(), None);
        assert_eq!(record.days_until_deadline(today), None);
        assert!(record.is_active_on(today));
        assert!(PolicyFilter::new().active_on(today).matches(&record));
    }

    #[test]
    fn test_support_type_parse() {
        assert_eq!("税收优惠".parse::<SupportType>().unwrap(), SupportType::Tax);
        assert_eq!("Grant".parse::<SupportType>().unwrap(), SupportType::Grant);
        assert!("nonsense".parse::<SupportType>().is_err());
    }
}
