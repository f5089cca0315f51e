//! Corpus statistics for listing and reporting.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::policy::{PolicyRecord, SupportType};

/// Counts over a set of policy records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total: usize,

    /// No stated deadline, or one not yet passed
    pub active: usize,

    /// Records whose ceiling or deadline is a placeholder
    pub with_placeholders: usize,

    /// Region to count, most common first
    pub by_region: IndexMap<String, usize>,

    pub by_support_type: IndexMap<SupportType, usize>,
}

impl CorpusStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PolicyRecord>, today: NaiveDate) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            if record.is_active_on(today) {
                stats.active += 1;
            }
            if record.provenance.max_amount_defaulted || record.provenance.deadline_defaulted {
                stats.with_placeholders += 1;
            }
            *stats.by_region.entry(record.region.clone()).or_default() += 1;
            *stats.by_support_type.entry(record.support_type).or_default() += 1;
        }
        stats.by_region.sort_by(|ka, a, kb, b| b.cmp(a).then_with(|| ka.cmp(kb)));
        stats.by_support_type.sort_by(|ka, a, kb, b| b.cmp(a).then_with(|| ka.cmp(kb)));
        stats
    }
}
