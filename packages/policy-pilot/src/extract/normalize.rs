//! HTML and text normalization.
//!
//! Picks the main content region through an ordered selector chain, strips
//! non-content markup, and produces plain text with line structure intact.
//! Also pulls the page title, date-labelled regions, the first PDF
//! attachment, and outgoing links that look like policy pages.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use super::rules::{
    CONTENT_SELECTORS, DATE_REGION_SELECTORS, POLICY_LINK_KEYWORDS, TITLE_SELECTORS,
};

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<!--.*?-->"));
static RE_NON_CONTENT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "noscript", "iframe", "nav", "header", "footer"]
        .iter()
        .map(|tag| re(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
        .collect()
});
static RE_HTML_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| re(r"\s+"));
static RE_BREAK: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<br\s*/?>"));
static RE_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)</?(?:p|div|h[1-6]|ul|ol|table|tbody|thead|section|article|blockquote|pre|dl)\b[^>]*>")
});
static RE_LINE_ITEM: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<(?:li|tr|dd|dt)\b[^>]*>"));
static RE_CELL: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)</t[dh]\s*>"));
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| re(r"<[^>]*>"));
static RE_LOOKS_LIKE_HTML: LazyLock<Regex> = LazyLock::new(|| re(r"<[a-zA-Z!/][^>]*>"));
static RE_NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| re(r"&#([xX][0-9a-fA-F]+|\d+);"));
static RE_INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| re(r"[ \t\x{3000}\x{a0}]+"));
static RE_EXTRA_NEWLINES: LazyLock<Regex> = LazyLock::new(|| re(r"\n{3,}"));

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("built-in pattern {pattern:?} is invalid: {e}"))
}

/// Output of normalizing one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPage {
    /// Title from the selector chain, site suffix removed
    pub title: Option<String>,

    /// Main content as plain text
    pub text: String,

    /// Short texts from date-labelled elements, in document order
    pub date_regions: Vec<String>,

    /// First PDF attachment, resolved against the page URL
    pub pdf_url: Option<String>,

    /// Outgoing links whose anchor text looks like a policy
    pub policy_links: Vec<String>,
}

/// Turns raw page bodies into plain text plus page metadata.
pub struct TextNormalizer {
    content: Vec<Selector>,
    title: Vec<(String, Selector)>,
    dates: Vec<Selector>,
    body: Option<Selector>,
    anchors: Option<Selector>,
    min_region_chars: usize,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            content: parse_selectors(CONTENT_SELECTORS),
            title: TITLE_SELECTORS
                .iter()
                .filter_map(|s| Selector::parse(s).ok().map(|sel| (s.to_string(), sel)))
                .collect(),
            dates: parse_selectors(DATE_REGION_SELECTORS),
            body: Selector::parse("body").ok(),
            anchors: Selector::parse("a[href]").ok(),
            min_region_chars: 100,
        }
    }

    /// A content region must exceed this many characters to be chosen.
    pub fn with_min_region_chars(mut self, chars: usize) -> Self {
        self.min_region_chars = chars;
        self
    }

    /// Normalize a page body. Plain-text bodies skip the HTML stages.
    pub fn normalize(&self, body: &str, page_url: Option<&str>) -> NormalizedPage {
        if !RE_LOOKS_LIKE_HTML.is_match(body) {
            return NormalizedPage {
                text: plain_text(body),
                ..Default::default()
            };
        }

        let document = Html::parse_document(body);
        let base = page_url.and_then(|u| Url::parse(u).ok());

        NormalizedPage {
            title: self.extract_title(&document),
            text: self.extract_content(&document, body),
            date_regions: self.extract_date_regions(&document),
            pdf_url: self.extract_pdf_url(&document, base.as_ref()),
            policy_links: self.extract_policy_links(&document, base.as_ref()),
        }
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        for (raw, selector) in &self.title {
            let Some(el) = document.select(selector).next() else {
                continue;
            };
            let text = collapse_inline(&element_text(&el));
            if text.is_empty() {
                continue;
            }
            let text = if raw == "title" { strip_site_name(&text) } else { text };
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    fn extract_content(&self, document: &Html, body: &str) -> String {
        for selector in &self.content {
            for el in document.select(selector) {
                if element_text(&el).trim().chars().count() > self.min_region_chars {
                    return html_to_text(&el.html());
                }
            }
        }

        if let Some(body_sel) = &self.body {
            if let Some(el) = document.select(body_sel).next() {
                return html_to_text(&el.html());
            }
        }
        html_to_text(body)
    }

    fn extract_date_regions(&self, document: &Html) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut regions = Vec::new();
        for selector in &self.dates {
            for el in document.select(selector) {
                let text = collapse_inline(&element_text(&el));
                // Containers like "timeline" also match [class*=time]; skip long blocks.
                if text.is_empty() || text.chars().count() > 80 {
                    continue;
                }
                if seen.insert(text.clone()) {
                    regions.push(text);
                }
            }
        }
        regions.truncate(10);
        regions
    }

    fn extract_pdf_url(&self, document: &Html, base: Option<&Url>) -> Option<String> {
        let anchors = self.anchors.as_ref()?;
        document
            .select(anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| is_pdf_href(href))
            .find_map(|href| resolve_href(href, base))
    }

    fn extract_policy_links(&self, document: &Html, base: Option<&Url>) -> Vec<String> {
        let Some(anchors) = self.anchors.as_ref() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        document
            .select(anchors)
            .filter(|a| {
                let text = element_text(a);
                POLICY_LINK_KEYWORDS.iter().any(|kw| text.contains(kw))
            })
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !is_pdf_href(href))
            .filter_map(|href| resolve_href(href, base))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

fn parse_selectors(raw: &[&str]) -> Vec<Selector> {
    raw.iter().filter_map(|s| Selector::parse(s).ok()).collect()
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("")
}

fn collapse_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<title>` values usually end in the site name after `|`, ` - ` or `_`.
fn strip_site_name(title: &str) -> String {
    let head = title
        .split('|')
        .next()
        .and_then(|t| t.split(" - ").next())
        .and_then(|t| t.split('_').next())
        .unwrap_or(title);
    head.trim().to_string()
}

fn is_pdf_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".pdf")
}

fn resolve_href(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// Convert an HTML fragment to plain text.
///
/// Paragraph-level elements are separated by one blank line. List items,
/// table rows and `<br>` end a line without starting a paragraph.
pub fn html_to_text(html: &str) -> String {
    let mut text = RE_COMMENT.replace_all(html, "").into_owned();
    for pattern in RE_NON_CONTENT.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text = RE_HTML_WHITESPACE.replace_all(&text, " ").into_owned();
    text = RE_BREAK.replace_all(&text, "\n").into_owned();
    text = RE_LINE_ITEM.replace_all(&text, "\n").into_owned();
    text = RE_PARAGRAPH.replace_all(&text, "\n\n").into_owned();
    text = RE_CELL.replace_all(&text, " ").into_owned();
    text = RE_TAG.replace_all(&text, "").into_owned();
    text = decode_entities(&text);

    let text = tidy_lines(&text);
    RE_EXTRA_NEWLINES.replace_all(&text, "\n\n").trim().to_string()
}

/// Normalize plain text: decode entities, collapse spaces, keep paragraph breaks.
pub fn plain_text(text: &str) -> String {
    let text = decode_entities(&text.replace("\r\n", "\n").replace('\r', "\n"));
    let text = tidy_lines(&text);
    RE_EXTRA_NEWLINES.replace_all(&text, "\n\n").trim().to_string()
}

fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(|line| RE_INLINE_SPACE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode the named entities policy pages use plus numeric references.
pub fn decode_entities(text: &str) -> String {
    let text = RE_NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    text.replace("&nbsp;", " ")
        .replace("&ensp;", " ")
        .replace("&emsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&ldquo;", "“")
        .replace("&rdquo;", "”")
        .replace("&mdash;", "—")
        .replace("&middot;", "·")
        .replace("&amp;", "&")
}
