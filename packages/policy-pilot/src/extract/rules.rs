//! Declarative rule tables for field extraction.
//!
//! Every table is evaluated in declared order and the first rule that
//! matches wins, except amount rules, which are all evaluated and the
//! maximum kept.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::policy::SupportType;

/// A named value selected when any of its keywords occurs in the text.
pub struct KeywordRule<T: 'static> {
    pub name: &'static str,
    pub value: T,
    pub keywords: &'static [&'static str],
}

impl<T: Copy> KeywordRule<T> {
    /// First keyword of this rule found in `text`.
    pub fn first_hit(&self, text: &str) -> Option<&'static str> {
        self.keywords.iter().copied().find(|kw| text.contains(kw))
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_hit(text).is_some()
    }
}

/// First rule in `rules` whose keywords occur in `text`.
pub fn first_keyword_match<'a, T: Copy>(
    rules: &'a [KeywordRule<T>],
    text: &str,
) -> Option<&'a KeywordRule<T>> {
    rules.iter().find(|rule| rule.matches(text))
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("built-in pattern {re:?} is invalid: {e}"))
}

// =============================================================================
// Support type
// =============================================================================

pub const SUPPORT_TYPE_RULES: &[KeywordRule<SupportType>] = &[
    KeywordRule {
        name: "grant",
        value: SupportType::Grant,
        keywords: &["无偿资助", "无偿", "不予返还", "资助", "奖励", "补助"],
    },
    KeywordRule {
        name: "subsidy",
        value: SupportType::Subsidy,
        keywords: &["补贴", "扶持资金", "专项资金"],
    },
    KeywordRule {
        name: "tax",
        value: SupportType::Tax,
        keywords: &["税收优惠", "减税", "免税", "所得税", "税收"],
    },
    KeywordRule {
        name: "loan",
        value: SupportType::Loan,
        keywords: &["贷款", "贴息", "融资", "担保"],
    },
    KeywordRule {
        name: "investment",
        value: SupportType::Investment,
        keywords: &["投资", "股权", "基金"],
    },
];

/// Words that mark a document as a policy even without a support keyword.
pub const POLICY_LIKE_KEYWORDS: &[&str] = &[
    "政策", "办法", "规定", "通知", "意见", "方案", "措施", "扶持", "支持", "申报",
];

// =============================================================================
// Amounts
// =============================================================================

/// A number followed by a currency unit.
pub struct AmountRule {
    pub name: &'static str,
    pub regex: &'static LazyLock<Regex>,
    /// Yuan per unit
    pub multiplier: u64,
}

static RE_AMOUNT_YI: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(\d[\d,，]*(?:\.\d+)?)\s*亿元"));
static RE_AMOUNT_QIANWAN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(\d[\d,，]*(?:\.\d+)?)\s*千万元"));
static RE_AMOUNT_WAN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(\d[\d,，]*(?:\.\d+)?)\s*万元"));

pub static AMOUNT_RULES: &[AmountRule] = &[
    AmountRule {
        name: "yi_yuan",
        regex: &RE_AMOUNT_YI,
        multiplier: 100_000_000,
    },
    AmountRule {
        name: "qianwan_yuan",
        regex: &RE_AMOUNT_QIANWAN,
        multiplier: 10_000_000,
    },
    AmountRule {
        name: "wan_yuan",
        regex: &RE_AMOUNT_WAN,
        multiplier: 10_000,
    },
];

/// Convert a decimal literal like `1,234.5` times `multiplier` into whole
/// yuan using integer arithmetic. Digits beyond yuan precision are dropped.
pub fn scale_amount(literal: &str, multiplier: u64) -> Option<u64> {
    let cleaned: String = literal.chars().filter(|c| *c != ',' && *c != '，').collect();
    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let multiplier = u128::from(multiplier);
    let mut total = int_part
        .parse::<u128>()
        .ok()?
        .checked_mul(multiplier)?;

    // multiplier is a power of ten, so each fractional digit is exact until
    // the place value drops below one yuan.
    let mut place = multiplier;
    for digit in frac_part.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        total = total.checked_add(u128::from(digit - b'0') * place)?;
    }

    u64::try_from(total).ok()
}

// =============================================================================
// Requirements
// =============================================================================

/// Section headings that introduce eligibility requirements, in priority order.
pub const REQUIREMENT_HEADINGS: &[&str] = &[
    "申请条件", "申报条件", "支持对象", "支持条件", "适用范围", "申请要求",
];

/// Heading followed by a colon or a line break.
pub fn requirement_heading_regex(heading: &str) -> Regex {
    pattern(&format!(r"{}\s*(?:[：:]|\n)", regex::escape(heading)))
}

pub static REQUIREMENT_HEADING_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| {
        REQUIREMENT_HEADINGS
            .iter()
            .map(|h| (*h, requirement_heading_regex(h)))
            .collect()
    });

/// End of a requirement section: a blank line or the next numbered heading.
pub static RE_SECTION_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\n[ \t\x{3000}]*\n|\n[ \t\x{3000}]*(?:[一二三四五六七八九十]+[、．.]|第[一二三四五六七八九十百零]+[条章节])")
});

/// Clause separators inside a requirement section.
pub static RE_CLAUSE_SPLIT: LazyLock<Regex> = LazyLock::new(|| pattern(r"[；;，,。\n]"));

/// Leading list markers: `（一）`, `(1)`, `1.`, `1、`, `①`, `-`, `•`.
pub static RE_LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^(?:[（(][一二三四五六七八九十\d]+[)）]|\d+[、.．)]|[①-⑳]|[-•·*])\s*")
});

pub const FALLBACK_CREDIT_REQUIREMENT: &str = "企业信用状况良好";
pub const FALLBACK_POLICY_REQUIREMENT: &str = "符合国家产业政策";
pub const FALLBACK_AI_REQUIREMENT: &str = "从事人工智能相关业务";

// =============================================================================
// Industry tags
// =============================================================================

pub const INDUSTRY_TAG_RULES: &[KeywordRule<&str>] = &[
    KeywordRule {
        name: "ai",
        value: "人工智能",
        keywords: &["人工智能", "AI", "智能", "算法", "大模型"],
    },
    KeywordRule {
        name: "tech_innovation",
        value: "科技创新",
        keywords: &["科技", "创新", "研发", "技术"],
    },
    KeywordRule {
        name: "manufacturing",
        value: "制造业",
        keywords: &["制造", "工业", "生产"],
    },
    KeywordRule {
        name: "digital_economy",
        value: "数字经济",
        keywords: &["数字化", "信息化", "互联网"],
    },
    KeywordRule {
        name: "biomedicine",
        value: "生物医药",
        keywords: &["生物", "医药", "医疗"],
    },
    KeywordRule {
        name: "new_energy",
        value: "新能源",
        keywords: &["新能源", "清洁能源", "节能"],
    },
    KeywordRule {
        name: "fintech",
        value: "金融科技",
        keywords: &["金融科技", "fintech", "FinTech", "支付"],
    },
    KeywordRule {
        name: "culture",
        value: "文创产业",
        keywords: &["文化", "创意", "设计"],
    },
    KeywordRule {
        name: "small_business",
        value: "小微企业",
        keywords: &["小微企业", "中小企业"],
    },
    KeywordRule {
        name: "housing",
        value: "住房保障",
        keywords: &["住房", "保障房", "安居"],
    },
];

// =============================================================================
// Dates
// =============================================================================

/// A date-shaped pattern with year, month, and day capture groups.
pub struct DateRule {
    pub name: &'static str,
    pub regex: &'static LazyLock<Regex>,
}

static RE_DATE_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(\d{4})\s*[-/.]\s*(\d{1,2})\s*[-/.]\s*(\d{1,2})")
});
static RE_DATE_CHINESE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日"));

pub static DATE_RULES: &[DateRule] = &[
    DateRule {
        name: "separated",
        regex: &RE_DATE_SEPARATED,
    },
    DateRule {
        name: "chinese",
        regex: &RE_DATE_CHINESE,
    },
];

/// Labels that introduce an application deadline.
pub const DEADLINE_LABELS: &[&str] = &["截止日期", "截止时间", "申报截止", "截至", "截止"];

/// Characters after a deadline label searched for a date.
pub const DEADLINE_WINDOW_CHARS: usize = 40;

// =============================================================================
// Departments
// =============================================================================

/// Department suffixes in priority order.
pub const DEPARTMENT_SUFFIXES: &[&str] = &["委员会", "局", "办公室", "办"];

/// Rest of a department name after its jurisdiction prefix, one per suffix
/// in [`DEPARTMENT_SUFFIXES`] order. Anchored at the start of the input.
pub static DEPARTMENT_TAIL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEPARTMENT_SUFFIXES
        .iter()
        .map(|suffix| pattern(&format!(r"^\p{{Han}}{{1,15}}?{}", regex::escape(suffix))))
        .collect()
});

const GENERIC_DEPARTMENT: &str =
    r"\p{Han}{2,4}?[省市](?:\p{Han}{2,4}?[区县])?\p{Han}{1,12}?(?:委员会|局|办公室)";

/// Department under any province or city, optionally with a district.
pub static RE_GENERIC_DEPARTMENT: LazyLock<Regex> = LazyLock::new(|| pattern(GENERIC_DEPARTMENT));

/// Same as [`RE_GENERIC_DEPARTMENT`] but must span the whole input.
pub static RE_GENERIC_DEPARTMENT_EXACT: LazyLock<Regex> =
    LazyLock::new(|| pattern(&format!("^(?:{GENERIC_DEPARTMENT})$")));

// =============================================================================
// Page structure
// =============================================================================

/// Main-content selectors, most specific first.
pub const CONTENT_SELECTORS: &[&str] = &[
    ".article-content",
    ".content-main",
    ".policy-content",
    ".article-body",
    "#article-content",
    ".text-content",
    "#zoom",
    ".TRS_Editor",
    "article",
];

pub const TITLE_SELECTORS: &[&str] = &[
    "h1.article-title",
    ".article-header h1",
    ".content-title h1",
    "h1",
    "title",
];

pub const DATE_REGION_SELECTORS: &[&str] = &[
    ".publish-date",
    ".article-date",
    ".date",
    ".time",
    "[class*=\"date\"]",
    "[class*=\"time\"]",
];

/// Link keywords that mark a likely policy page.
pub const POLICY_LINK_KEYWORDS: &[&str] = &[
    "政策", "办法", "规定", "通知", "公告", "意见", "方案", "补贴", "扶持", "资助",
];
