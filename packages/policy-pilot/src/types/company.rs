//! Company profiles and their classification vocabularies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{PilotError, Result};

/// Industry a company operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndustryCategory {
    Ai,
    Tech,
    Manufacturing,
    Service,
    Biotech,
    NewEnergy,
    Software,
    Other,
}

impl IndustryCategory {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::Ai => "人工智能",
            Self::Tech => "科技创新",
            Self::Manufacturing => "制造业",
            Self::Service => "服务业",
            Self::Biotech => "生物医药",
            Self::NewEnergy => "新能源",
            Self::Software => "软件和信息服务",
            Self::Other => "其他",
        }
    }

    /// Generic technology categories earn partial industry credit.
    pub fn is_generic_tech(&self) -> bool {
        matches!(self, Self::Tech | Self::Software)
    }
}

impl FromStr for IndustryCategory {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ai" | "人工智能" => Ok(Self::Ai),
            "tech" | "科技" | "科技创新" => Ok(Self::Tech),
            "manufacturing" | "制造" | "制造业" => Ok(Self::Manufacturing),
            "service" | "服务" | "服务业" => Ok(Self::Service),
            "biotech" | "生物医药" => Ok(Self::Biotech),
            "newenergy" | "new_energy" | "新能源" => Ok(Self::NewEnergy),
            "software" | "软件" => Ok(Self::Software),
            "other" | "其他" => Ok(Self::Other),
            other => Err(PilotError::invalid_argument(format!("unknown industry: {other}"))),
        }
    }
}

/// Company size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleClass {
    Micro,
    Small,
    Medium,
    Large,
    Startup,
}

impl ScaleClass {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::Micro => "微型企业",
            Self::Small => "小型企业",
            Self::Medium => "中型企业",
            Self::Large => "大型企业",
            Self::Startup => "初创企业",
        }
    }
}

impl FromStr for ScaleClass {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "micro" | "微型" | "微型企业" => Ok(Self::Micro),
            "small" | "小型" | "小型企业" => Ok(Self::Small),
            "medium" | "中型" | "中型企业" => Ok(Self::Medium),
            "large" | "大型" | "大型企业" => Ok(Self::Large),
            "startup" | "初创" | "初创企业" => Ok(Self::Startup),
            other => Err(PilotError::invalid_argument(format!("unknown scale: {other}"))),
        }
    }
}

/// R&D spend as a share of revenue, bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RdIntensity {
    None,
    Low,
    Medium,
    High,
}

impl RdIntensity {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::None => "无研发投入",
            Self::Low => "低于3%",
            Self::Medium => "3%-10%",
            Self::High => "高于10%",
        }
    }
}

impl FromStr for RdIntensity {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "无" => Ok(Self::None),
            "low" | "低" => Ok(Self::Low),
            "medium" | "中" => Ok(Self::Medium),
            "high" | "高" => Ok(Self::High),
            other => Err(PilotError::invalid_argument(format!(
                "unknown R&D intensity: {other}"
            ))),
        }
    }
}

/// Official company certification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Certification {
    HighTech,
    Specialized,
    Sme,
    Startup,
    #[default]
    None,
}

impl Certification {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::HighTech => "高新技术企业",
            Self::Specialized => "专精特新企业",
            Self::Sme => "科技型中小企业",
            Self::Startup => "创新型初创企业",
            Self::None => "无",
        }
    }
}

/// Coarse credit classification of the free-text credit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditGrade {
    Good,
    Fair,
    Poor,
}

impl CreditGrade {
    /// `good`/`良好`/A-grades are good, `fair`/`一般`/B-grades fair, anything else poor.
    pub fn classify(status: &str) -> Self {
        let status = status.trim();
        let lower = status.to_lowercase();
        if lower.contains("良好") || lower.contains("优秀") || lower == "good" || lower == "excellent" {
            return Self::Good;
        }
        if lower.contains("一般") || lower == "fair" || lower == "average" {
            return Self::Fair;
        }
        match letter_grade(status) {
            Some('A') => Self::Good,
            Some('B') => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Letter of a grade like `AAA`, `A+`, `B级`.
fn letter_grade(status: &str) -> Option<char> {
    let grade = status.trim_end_matches('级').to_uppercase();
    let first = grade.chars().next()?;
    grade
        .chars()
        .all(|c| c == first || c == '+' || c == '-')
        .then_some(first)
}

/// A company to be matched against the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,

    /// Registration location, e.g. 上海市徐汇区
    pub jurisdiction: String,

    pub industry: IndustryCategory,

    pub scale: ScaleClass,

    pub rd: RdIntensity,

    #[serde(default)]
    pub patents: u32,

    #[serde(default)]
    pub certification: Certification,

    #[serde(default)]
    pub credit_status: String,

    #[serde(default)]
    pub operating_status: String,
}

impl CompanyProfile {
    pub fn new(
        name: impl Into<String>,
        jurisdiction: impl Into<String>,
        industry: IndustryCategory,
        scale: ScaleClass,
        rd: RdIntensity,
    ) -> Self {
        Self {
            name: name.into(),
            jurisdiction: jurisdiction.into(),
            industry,
            scale,
            rd,
            patents: 0,
            certification: Certification::None,
            credit_status: String::new(),
            operating_status: String::new(),
        }
    }

    pub fn with_patents(mut self, patents: u32) -> Self {
        self.patents = patents;
        self
    }

    pub fn with_certification(mut self, certification: Certification) -> Self {
        self.certification = certification;
        self
    }

    pub fn with_credit_status(mut self, status: impl Into<String>) -> Self {
        self.credit_status = status.into();
        self
    }

    pub fn with_operating_status(mut self, status: impl Into<String>) -> Self {
        self.operating_status = status.into();
        self
    }

    pub fn credit_grade(&self) -> CreditGrade {
        CreditGrade::classify(&self.credit_status)
    }

    /// Reject profiles that cannot be scored at all.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PilotError::InvalidProfile {
                reason: "company name is empty".into(),
            });
        }
        if self.jurisdiction.trim().is_empty() {
            return Err(PilotError::InvalidProfile {
                reason: "jurisdiction is empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_classification() {
        assert_eq!(CreditGrade::classify("良好"), CreditGrade::Good);
        assert_eq!(CreditGrade::classify("信用良好"), CreditGrade::Good);
        assert_eq!(CreditGrade::classify("AAA"), CreditGrade::Good);
        assert_eq!(CreditGrade::classify("A级"), CreditGrade::Good);
        assert_eq!(CreditGrade::classify("good"), CreditGrade::Good);
        assert_eq!(CreditGrade::classify("一般"), CreditGrade::Fair);
        assert_eq!(CreditGrade::classify("BB"), CreditGrade::Fair);
        assert_eq!(CreditGrade::classify("较差"), CreditGrade::Poor);
        assert_eq!(CreditGrade::classify(""), CreditGrade::Poor);
        assert_eq!(CreditGrade::classify("AB"), CreditGrade::Poor);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let ok = CompanyProfile::new(
            "徐汇智能科技",
            "上海市徐汇区",
            IndustryCategory::Ai,
            ScaleClass::Small,
            RdIntensity::High,
        );
        assert!(ok.validate().is_ok());

        let mut blank_name = ok.clone();
        blank_name.name = "  ".into();
        assert!(matches!(
            blank_name.validate(),
            Err(PilotError::InvalidProfile { .. })
        ));

        let mut blank_region = ok;
        blank_region.jurisdiction = String::new();
        assert!(blank_region.validate().is_err());
    }

    #[test]
    fn test_vocab_parsing() {
        assert_eq!("人工智能".parse::<IndustryCategory>().unwrap(), IndustryCategory::Ai);
        assert_eq!("newenergy".parse::<IndustryCategory>().unwrap(), IndustryCategory::NewEnergy);
        assert_eq!("Medium".parse::<ScaleClass>().unwrap(), ScaleClass::Medium);
        assert_eq!("high".parse::<RdIntensity>().unwrap(), RdIntensity::High);
        assert!("giant".parse::<ScaleClass>().is_err());
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let json = r#"{
            "name": "测试企业",
            "jurisdiction": "上海市徐汇区",
            "industry": "ai",
            "scale": "small",
            "rd": "high",
            "certification": "high_tech"
        }"#;
        let profile: CompanyProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.patents, 0);
        assert_eq!(profile.certification, Certification::HighTech);
        assert_eq!(profile.credit_grade(), CreditGrade::Poor);
    }
}
