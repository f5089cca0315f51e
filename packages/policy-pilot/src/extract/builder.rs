//! Assembly of canonical policy records.

use chrono::{DateTime, Utc};

use super::fields::{ExtractedFields, ExtractionHints, FieldExtractor};
use super::normalize::NormalizedPage;
use crate::traits::store::UpsertOutcome;
use crate::types::policy::{FieldProvenance, IdentityKey, PolicyRecord, PolicyTargeting};

/// Page-level metadata that does not come from the extractor.
#[derive(Debug, Clone)]
pub struct PageMetadata {
    pub source_url: String,

    /// Title configured for the target, used when the page has none
    pub fallback_title: String,

    pub category: String,

    /// Source jurisdiction; empty means national
    pub region: String,

    pub fetched_at: DateTime<Utc>,
}

impl PageMetadata {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            fallback_title: String::new(),
            category: String::new(),
            region: String::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = title.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }
}

/// Builds [`PolicyRecord`]s from normalized pages and decides new vs. update.
#[derive(Debug, Clone, Default)]
pub struct PolicyRecordBuilder {
    extractor: FieldExtractor,
    targeting: PolicyTargeting,
}

impl PolicyRecordBuilder {
    pub fn new(extractor: FieldExtractor) -> Self {
        Self {
            extractor,
            targeting: PolicyTargeting::default(),
        }
    }

    /// Targeting stamped on every built record.
    pub fn with_targeting(mut self, targeting: PolicyTargeting) -> Self {
        self.targeting = targeting;
        self
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    /// Run extraction over a normalized page and assemble the record.
    pub fn build_from_page(&self, meta: &PageMetadata, page: &NormalizedPage) -> PolicyRecord {
        let title = resolve_title(page.title.as_deref(), &meta.fallback_title, &meta.source_url);
        let hints = ExtractionHints::new()
            .with_jurisdiction(meta.region.clone())
            .with_date_regions(page.date_regions.clone());
        let fields = self.extractor.extract_with_hints(&title, &page.text, &hints);

        let mut record = self.build(meta, &title, &page.text, fields);
        record.pdf_url = page.pdf_url.clone();
        record
    }

    /// Assemble a record from already-extracted fields.
    pub fn build(
        &self,
        meta: &PageMetadata,
        title: &str,
        text: &str,
        fields: ExtractedFields,
    ) -> PolicyRecord {
        let key = IdentityKey::new(title, &meta.source_url);
        let provenance = FieldProvenance {
            max_amount_defaulted: fields.max_amount.is_defaulted(),
            deadline_defaulted: fields.deadline.is_defaulted(),
            department_defaulted: fields.department.is_defaulted(),
            requirements_defaulted: fields.requirements.is_defaulted(),
        };
        let config = self.extractor.config();

        let mut industry_tags = fields.industry_tags;
        industry_tags.truncate(config.max_industry_tags);
        let mut requirements = fields.requirements.into_value();
        requirements.truncate(config.max_requirements);

        PolicyRecord {
            id: key.record_id(),
            title: key.title,
            region: if meta.region.trim().is_empty() {
                "全国".to_string()
            } else {
                meta.region.trim().to_string()
            },
            category: meta.category.clone(),
            department: fields.department.into_value(),
            support_type: fields.support_type,
            max_amount: Some(fields.max_amount.into_value()),
            deadline: Some(fields.deadline.into_value()),
            industry_tags,
            requirements,
            raw_content: text.to_string(),
            source_url: key.source_url,
            pdf_url: None,
            targeting: self.targeting.clone(),
            provenance,
            crawl_time: meta.fetched_at,
            updated_at: meta.fetched_at,
        }
    }
}

/// Merge an incoming record with whatever the store holds for its identity.
///
/// Updates keep the stored id and first crawl time; every other field comes
/// from `incoming`.
pub fn prepare_upsert(
    existing: Option<&PolicyRecord>,
    mut incoming: PolicyRecord,
) -> (PolicyRecord, UpsertOutcome) {
    match existing {
        Some(current) => {
            incoming.id = current.id.clone();
            incoming.updated_at = incoming.crawl_time.max(current.updated_at);
            incoming.crawl_time = current.crawl_time;
            (incoming, UpsertOutcome::Updated)
        }
        None => {
            incoming.updated_at = incoming.crawl_time;
            (incoming, UpsertOutcome::Inserted)
        }
    }
}

fn resolve_title(page_title: Option<&str>, fallback: &str, url: &str) -> String {
    [page_title.unwrap_or_default(), fallback]
        .into_iter()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::normalize::TextNormalizer;
    use crate::types::policy::SupportType;
    use chrono::{NaiveDate, TimeZone};

    fn meta() -> PageMetadata {
        PageMetadata::new("https://www.xuhui.gov.cn/zcwj/ai.html")
            .with_fallback_title("徐汇区人工智能扶持政策")
            .with_category("产业扶持")
            .with_region("上海市徐汇区")
            .with_fetched_at(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
    }

    fn page(text: &str) -> NormalizedPage {
        NormalizedPage {
            title: Some("关于支持人工智能产业发展的若干措施".into()),
            text: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_from_page() {
        let record = PolicyRecordBuilder::default().build_from_page(
            &meta(),
            &page("申请条件：企业注册地在徐汇区；从事人工智能相关业务\n\n最高补贴50万元。申报截止日期：2024年6月30日。"),
        );

        assert_eq!(record.title, "关于支持人工智能产业发展的若干措施");
        assert_eq!(record.region, "上海市徐汇区");
        assert_eq!(record.category, "产业扶持");
        assert_eq!(record.support_type, SupportType::Subsidy);
        assert_eq!(record.max_amount, Some(500_000));
        assert_eq!(record.deadline, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(record.requirements.len(), 2);
        assert_eq!(record.industry_tags[0], "人工智能");
        assert_eq!(record.department, "徐汇区相关部门");
        assert!(record.provenance.department_defaulted);
        assert!(!record.provenance.max_amount_defaulted);
        assert_eq!(record.id, IdentityKey::new(&record.title, &record.source_url).record_id());
        assert_eq!(record.targeting, PolicyTargeting::default());
    }

    #[test]
    fn test_html_requirement_section_ends_with_its_paragraph() {
        let html = r#"<html><body><div class="article-content">
            <p>申请条件：企业须注册成立一年以上；研发费用占销售收入比例符合规定。</p>
            <p>本办法由国家税务总局负责解释，自发布之日起施行。</p>
            <p>发布单位：国家税务总局</p>
        </div></body></html>"#;
        let normalized = TextNormalizer::new()
            .with_min_region_chars(20)
            .normalize(html, Some("https://www.chinatax.gov.cn/n1.html"));
        let meta = PageMetadata::new("https://www.chinatax.gov.cn/n1.html")
            .with_fallback_title("研发费用加计扣除政策");
        let record = PolicyRecordBuilder::default().build_from_page(&meta, &normalized);

        assert_eq!(
            record.requirements,
            vec!["企业须注册成立一年以上", "研发费用占销售收入比例符合规定"]
        );
        assert!(!record.provenance.requirements_defaulted);
    }

    #[test]
    fn test_placeholders_are_flagged() {
        let record = PolicyRecordBuilder::default().build_from_page(&meta(), &page("暂无更多信息"));
        assert_eq!(record.max_amount, Some(1_000_000));
        assert!(record.provenance.max_amount_defaulted);
        assert!(record.provenance.deadline_defaulted);
        assert!(record.provenance.requirements_defaulted);
    }

    #[test]
    fn test_title_falls_back_to_target_then_url() {
        assert_eq!(resolve_title(Some("  "), "目标标题", "u"), "目标标题");
        assert_eq!(resolve_title(None, "", "https://x"), "https://x");
    }

    #[test]
    fn test_empty_region_means_national() {
        let meta = meta().with_region("");
        let record = PolicyRecordBuilder::default().build_from_page(&meta, &page("内容"));
        assert_eq!(record.region, "全国");
        assert!(record.is_national());
    }

    #[test]
    fn test_prepare_upsert_preserves_identity() {
        let builder = PolicyRecordBuilder::default();
        let first = builder.build_from_page(&meta(), &page("最高补贴50万元"));

        let later = meta().with_fetched_at(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let second = builder.build_from_page(&later, &page("最高补贴80万元"));

        let (merged, outcome) = prepare_upsert(Some(&first), second.clone());
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.crawl_time, first.crawl_time);
        assert_eq!(merged.updated_at, second.crawl_time);
        assert_eq!(merged.max_amount, Some(800_000));

        let (fresh, outcome) = prepare_upsert(None, first.clone());
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(fresh, first);
    }
}
