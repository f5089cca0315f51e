//! Structured field extraction from normalized policy text.

use chrono::NaiveDate;
use indexmap::IndexSet;
use regex::Regex;
use tracing::trace;

use super::rules::{
    first_keyword_match, scale_amount, AMOUNT_RULES, DATE_RULES,
    DEADLINE_LABELS, DEADLINE_WINDOW_CHARS, DEPARTMENT_TAIL_PATTERNS, FALLBACK_AI_REQUIREMENT,
    FALLBACK_CREDIT_REQUIREMENT, FALLBACK_POLICY_REQUIREMENT, INDUSTRY_TAG_RULES,
    POLICY_LIKE_KEYWORDS, RE_CLAUSE_SPLIT, RE_GENERIC_DEPARTMENT, RE_GENERIC_DEPARTMENT_EXACT,
    RE_LIST_MARKER, RE_SECTION_BOUNDARY, REQUIREMENT_HEADING_PATTERNS, SUPPORT_TYPE_RULES,
};
use crate::types::config::ExtractorConfig;
use crate::types::policy::SupportType;

/// A field value and whether it came from the page or from a default.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Found(T),
    Defaulted(T),
}

impl<T> Extracted<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Found(v) | Self::Defaulted(v) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Found(v) | Self::Defaulted(v) => v,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted(_))
    }

    fn found_or(value: Option<T>, default: impl FnOnce() -> T) -> Self {
        match value {
            Some(v) => Self::Found(v),
            None => Self::Defaulted(default()),
        }
    }
}

/// Page context that sharpens extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionHints {
    /// Source jurisdiction from the crawl target, e.g. 上海市徐汇区
    pub jurisdiction: Option<String>,

    /// Texts of date-labelled page elements
    pub date_regions: Vec<String>,
}

impl ExtractionHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        let jurisdiction = jurisdiction.into();
        self.jurisdiction = (!jurisdiction.trim().is_empty()).then_some(jurisdiction);
        self
    }

    pub fn with_date_regions(mut self, regions: Vec<String>) -> Self {
        self.date_regions = regions;
        self
    }
}

/// Fields derived from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub support_type: SupportType,
    pub max_amount: Extracted<u64>,
    pub deadline: Extracted<NaiveDate>,
    pub requirements: Extracted<Vec<String>>,
    pub industry_tags: Vec<String>,
    pub department: Extracted<String>,
}

/// Rule-driven field extractor. Never fails; gaps resolve to defaults.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    config: ExtractorConfig,
}

impl FieldExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn extract(&self, title: &str, text: &str) -> ExtractedFields {
        self.extract_with_hints(title, text, &ExtractionHints::default())
    }

    pub fn extract_with_hints(
        &self,
        title: &str,
        text: &str,
        hints: &ExtractionHints,
    ) -> ExtractedFields {
        let combined = if title.is_empty() {
            text.to_string()
        } else {
            format!("{title}\n{text}")
        };
        let jurisdiction = hints.jurisdiction.as_deref();

        let requirements = match self.requirements(text) {
            found if !found.is_empty() => Extracted::Found(found),
            _ => Extracted::Defaulted(self.fallback_requirements(&combined, jurisdiction)),
        };

        let fields = ExtractedFields {
            support_type: self.support_type(title, text),
            max_amount: Extracted::found_or(self.max_amount(&combined), || {
                self.config.placeholder_amount
            }),
            deadline: Extracted::found_or(self.deadline(text, &hints.date_regions), || {
                self.config.placeholder_deadline
            }),
            requirements,
            industry_tags: self.industry_tags(title, text),
            department: Extracted::found_or(self.department(text, jurisdiction), || {
                default_department(jurisdiction)
            }),
        };

        trace!(
            support_type = %fields.support_type,
            amount_defaulted = fields.max_amount.is_defaulted(),
            deadline_defaulted = fields.deadline.is_defaulted(),
            requirements = fields.requirements.value().len(),
            tags = fields.industry_tags.len(),
            "fields extracted"
        );

        fields
    }

    /// First support bucket whose keywords appear; policy-like text defaults to subsidy.
    pub fn support_type(&self, title: &str, text: &str) -> SupportType {
        let haystack = format!("{title}\n{text}");
        if let Some(rule) = first_keyword_match(SUPPORT_TYPE_RULES, &haystack) {
            return rule.value;
        }
        if POLICY_LIKE_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
            SupportType::Subsidy
        } else {
            SupportType::Other
        }
    }

    /// Largest amount stated in any supported unit, in whole yuan.
    pub fn max_amount(&self, text: &str) -> Option<u64> {
        AMOUNT_RULES
            .iter()
            .flat_map(|rule| {
                rule.regex
                    .captures_iter(text)
                    .filter_map(move |caps| scale_amount(&caps[1], rule.multiplier))
            })
            .max()
    }

    /// Requirement clauses from the first heading that yields any.
    pub fn requirements(&self, text: &str) -> Vec<String> {
        for (heading, pattern) in REQUIREMENT_HEADING_PATTERNS.iter() {
            for m in pattern.find_iter(text) {
                let rest = text[m.end()..].trim_start();
                let section = &rest[..section_end(rest)];
                let clauses = self.split_clauses(section);
                if !clauses.is_empty() {
                    trace!(heading = %heading, count = clauses.len(), "requirements section found");
                    return clauses;
                }
            }
        }
        Vec::new()
    }

    fn split_clauses(&self, section: &str) -> Vec<String> {
        let mut clauses = IndexSet::new();
        for raw in RE_CLAUSE_SPLIT.split(section) {
            let clause = RE_LIST_MARKER.replace(raw.trim(), "");
            let clause = clause.trim().trim_end_matches(['：', ':']).trim();
            if clause.chars().count() > self.config.min_requirement_chars {
                clauses.insert(clause.to_string());
            }
            if clauses.len() >= self.config.max_requirements {
                break;
            }
        }
        clauses.into_iter().collect()
    }

    fn fallback_requirements(&self, text: &str, jurisdiction: Option<&str>) -> Vec<String> {
        let mut requirements = Vec::new();
        if let Some(local) = jurisdiction.map(local_jurisdiction) {
            if !local.is_empty() && text.contains(local) {
                requirements.push(format!("企业注册地在{local}"));
            }
        }
        if text.contains("人工智能") {
            requirements.push(FALLBACK_AI_REQUIREMENT.to_string());
        }
        requirements.push(FALLBACK_CREDIT_REQUIREMENT.to_string());
        requirements.push(FALLBACK_POLICY_REQUIREMENT.to_string());
        requirements.truncate(self.config.max_requirements);
        requirements
    }

    /// Tags whose keywords appear in title or text, in table order.
    pub fn industry_tags(&self, title: &str, text: &str) -> Vec<String> {
        INDUSTRY_TAG_RULES
            .iter()
            .filter(|rule| rule.matches(title) || rule.matches(text))
            .map(|rule| rule.value.to_string())
            .take(self.config.max_industry_tags)
            .collect()
    }

    /// First valid date near a deadline label, then in date regions, then anywhere.
    pub fn deadline(&self, text: &str, date_regions: &[String]) -> Option<NaiveDate> {
        for label in DEADLINE_LABELS {
            for (idx, _) in text.match_indices(label) {
                let after = &text[idx + label.len()..];
                let window: String = after.chars().take(DEADLINE_WINDOW_CHARS).collect();
                if let Some(date) = first_date(&window) {
                    return Some(date);
                }
            }
        }
        date_regions
            .iter()
            .find_map(|region| first_date(region))
            .or_else(|| first_date(text))
    }

    /// Jurisdiction-qualified department first, then any province/city department.
    pub fn department(&self, text: &str, jurisdiction: Option<&str>) -> Option<String> {
        if let Some(jurisdiction) = jurisdiction {
            for prefix in jurisdiction_prefixes(jurisdiction) {
                for tail in DEPARTMENT_TAIL_PATTERNS.iter() {
                    if let Some(name) = qualified_department(text, prefix, tail) {
                        return Some(name);
                    }
                }
            }
        }
        generic_department(text)
    }
}

/// Byte offset where a requirement section ends. A blank line ends it unless
/// the next paragraph is another list item, so `<p>`-per-item pages stay whole.
fn section_end(section: &str) -> usize {
    for boundary in RE_SECTION_BOUNDARY.find_iter(section) {
        let blank_line = boundary.as_str().ends_with('\n');
        if blank_line && RE_LIST_MARKER.is_match(section[boundary.end()..].trim_start()) {
            continue;
        }
        return boundary.start();
    }
    section.len()
}

/// Leftmost `prefix` occurrence followed by a department tail.
fn qualified_department(text: &str, prefix: &str, tail: &Regex) -> Option<String> {
    text.match_indices(prefix).find_map(|(idx, _)| {
        let end = idx + prefix.len();
        tail.find(&text[end..])
            .map(|m| text[idx..end + m.end()].to_string())
    })
}

/// The leftmost generic match may start inside preceding words, so keep the
/// latest start that still forms a complete department name.
fn generic_department(text: &str) -> Option<String> {
    let span = RE_GENERIC_DEPARTMENT.find(text)?.as_str();
    let name = span
        .char_indices()
        .map(|(idx, _)| &span[idx..])
        .rev()
        .find(|candidate| RE_GENERIC_DEPARTMENT_EXACT.is_match(candidate))
        .unwrap_or(span);
    Some(name.to_string())
}

/// First valid calendar date in `text` by rule priority.
pub fn first_date(text: &str) -> Option<NaiveDate> {
    DATE_RULES.iter().find_map(|rule| {
        rule.regex.captures_iter(text).find_map(|caps| {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    })
}

/// District or county part of a jurisdiction like 上海市徐汇区, else the whole name.
pub fn local_jurisdiction(jurisdiction: &str) -> &str {
    let jurisdiction = jurisdiction.trim();
    if jurisdiction.ends_with(['区', '县']) {
        if let Some((idx, ch)) = jurisdiction
            .char_indices()
            .rev()
            .find(|(_, c)| matches!(c, '省' | '市'))
        {
            let local = &jurisdiction[idx + ch.len_utf8()..];
            if !local.is_empty() {
                return local;
            }
        }
    }
    jurisdiction
}

/// Prefixes a department name may start with, most local first.
fn jurisdiction_prefixes(jurisdiction: &str) -> Vec<&str> {
    let jurisdiction = jurisdiction.trim();
    let mut prefixes = IndexSet::new();
    prefixes.insert(local_jurisdiction(jurisdiction));
    if let Some((idx, ch)) = jurisdiction.char_indices().find(|(_, c)| *c == '市') {
        prefixes.insert(&jurisdiction[..idx + ch.len_utf8()]);
    }
    prefixes.insert(jurisdiction);
    prefixes.into_iter().filter(|p| !p.is_empty()).collect()
}

fn default_department(jurisdiction: Option<&str>) -> String {
    match jurisdiction.map(local_jurisdiction) {
        Some(local) if !local.is_empty() => format!("{local}相关部门"),
        _ => "相关部门".to_string(),
    }
}
