//! Rule-based defect classification for crawled pages.
//!
//! The rule set is data, not control flow: each rule is a predicate plus
//! an issue template, evaluated in a fixed order. Classification is pure
//! and total - a record with missing fields is treated as "everything
//! absent", never rejected.

use serde::{Deserialize, Serialize};
use sitescore_scanner::PageRecord;
use std::collections::HashMap;
use url::Url;

pub const TITLE_MAX_CHARS: usize = 60;
pub const META_DESCRIPTION_MAX_CHARS: usize = 160;
pub const THIN_CONTENT_WORDS: usize = 300;
pub const SLOW_LOAD_MS: u64 = 3000;
pub const VERY_SLOW_LOAD_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Seo,
    Technical,
    Performance,
    Content,
    Accessibility,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Seo => "seo",
            IssueCategory::Technical => "technical",
            IssueCategory::Performance => "performance",
            IssueCategory::Content => "content",
            IssueCategory::Accessibility => "accessibility",
        }
    }

    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::Seo,
        IssueCategory::Technical,
        IssueCategory::Performance,
        IssueCategory::Content,
        IssueCategory::Accessibility,
    ];
}

/// A classified defect on one page of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: String,
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub affected_url: String,
    pub can_auto_fix: bool,
    pub metadata: HashMap<String, String>,
}

/// One entry of the classification table: a predicate plus the template
/// of the issue it raises.
pub struct Rule {
    pub key: &'static str,
    pub category: IssueCategory,
    pub can_auto_fix: bool,
    pub recommendation: &'static str,
    triggers: fn(&PageRecord) -> bool,
    severity: fn(&PageRecord) -> Severity,
    description: fn(&PageRecord) -> String,
    metadata: fn(&PageRecord) -> Vec<(&'static str, String)>,
}

impl Rule {
    fn apply(&self, page: &PageRecord) -> Option<Issue> {
        if !(self.triggers)(page) {
            return None;
        }
        Some(Issue {
            issue_type: self.key.to_string(),
            category: self.category,
            severity: (self.severity)(page),
            description: (self.description)(page),
            recommendation: self.recommendation.to_string(),
            affected_url: page.url.clone(),
            can_auto_fix: self.can_auto_fix,
            metadata: (self.metadata)(page)
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }
}

fn title_text(page: &PageRecord) -> &str {
    page.title.as_deref().unwrap_or("").trim()
}

fn description_text(page: &PageRecord) -> &str {
    page.meta_description.as_deref().unwrap_or("").trim()
}

fn missing_alt_count(page: &PageRecord) -> usize {
    page.images
        .iter()
        .filter(|img| img.alt.as_deref().map(str::trim).unwrap_or("").is_empty())
        .count()
}

fn is_local_host(page: &PageRecord) -> bool {
    Url::parse(&page.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "localhost" || h.starts_with("127.")))
        .unwrap_or(false)
}

fn no_metadata(_: &PageRecord) -> Vec<(&'static str, String)> {
    Vec::new()
}

const SEO_RULES: &[Rule] = &[
    Rule {
        key: "missing_title",
        category: IssueCategory::Seo,
        can_auto_fix: true,
        recommendation: "Add a unique, descriptive <title> of up to 60 characters.",
        triggers: |p| title_text(p).is_empty(),
        severity: |_| Severity::Critical,
        description: |_| "The page has no title tag.".to_string(),
        metadata: no_metadata,
    },
    Rule {
        key: "title_too_long",
        category: IssueCategory::Seo,
        can_auto_fix: true,
        recommendation: "Shorten the title so search results don't truncate it.",
        triggers: |p| title_text(p).chars().count() > TITLE_MAX_CHARS,
        severity: |_| Severity::Low,
        description: |p| {
            format!(
                "The title is {} characters long (recommended maximum is {}).",
                title_text(p).chars().count(),
                TITLE_MAX_CHARS
            )
        },
        metadata: |p| vec![("title_length", title_text(p).chars().count().to_string())],
    },
    Rule {
        key: "missing_meta_description",
        category: IssueCategory::Seo,
        can_auto_fix: true,
        recommendation: "Add a meta description summarizing the page in up to 160 characters.",
        triggers: |p| description_text(p).is_empty(),
        severity: |_| Severity::High,
        description: |_| "The page has no meta description.".to_string(),
        metadata: no_metadata,
    },
    Rule {
        key: "meta_description_too_long",
        category: IssueCategory::Seo,
        can_auto_fix: true,
        recommendation: "Trim the meta description below 160 characters.",
        triggers: |p| description_text(p).chars().count() > META_DESCRIPTION_MAX_CHARS,
        severity: |_| Severity::Low,
        description: |p| {
            format!(
                "The meta description is {} characters long (recommended maximum is {}).",
                description_text(p).chars().count(),
                META_DESCRIPTION_MAX_CHARS
            )
        },
        metadata: |p| {
            vec![(
                "description_length",
                description_text(p).chars().count().to_string(),
            )]
        },
    },
    Rule {
        key: "missing_h1",
        category: IssueCategory::Seo,
        can_auto_fix: true,
        recommendation: "Add exactly one H1 heading describing the page topic.",
        triggers: |p| p.headings.h1.is_empty(),
        severity: |_| Severity::High,
        description: |_| "The page has no H1 heading.".to_string(),
        metadata: no_metadata,
    },
    Rule {
        key: "multiple_h1",
        category: IssueCategory::Seo,
        can_auto_fix: false,
        recommendation: "Keep a single H1 and demote the others to H2.",
        triggers: |p| p.headings.h1.len() > 1,
        severity: |_| Severity::Medium,
        description: |p| format!("The page has {} H1 headings.", p.headings.h1.len()),
        metadata: |p| vec![("h1_count", p.headings.h1.len().to_string())],
    },
    Rule {
        key: "missing_canonical",
        category: IssueCategory::Seo,
        can_auto_fix: true,
        recommendation: "Add a rel=canonical link to declare the preferred URL.",
        triggers: |p| p.canonical.is_none(),
        severity: |_| Severity::Low,
        description: |_| "The page declares no canonical URL.".to_string(),
        metadata: no_metadata,
    },
];

const TECHNICAL_RULES: &[Rule] = &[
    Rule {
        key: "broken_page",
        category: IssueCategory::Technical,
        can_auto_fix: false,
        recommendation: "Fix or remove the page, or redirect it to a working URL.",
        triggers: |p| p.status_code >= 400,
        severity: |_| Severity::Critical,
        description: |p| format!("The page returned HTTP status {}.", p.status_code),
        metadata: |p| vec![("status_code", p.status_code.to_string())],
    },
    Rule {
        key: "page_not_indexable",
        category: IssueCategory::Technical,
        can_auto_fix: false,
        recommendation: "Remove the noindex directive if this page should appear in search results.",
        triggers: |p| !p.is_indexable,
        severity: |_| Severity::Medium,
        description: |_| "The page is blocked from indexing by a robots meta tag.".to_string(),
        metadata: no_metadata,
    },
    Rule {
        key: "insecure_transport",
        category: IssueCategory::Technical,
        can_auto_fix: false,
        recommendation: "Serve the page over HTTPS and redirect HTTP traffic.",
        triggers: |p| p.url.starts_with("http://") && !is_local_host(p),
        severity: |_| Severity::Medium,
        description: |p| format!("The page {} is served over HTTP instead of HTTPS.", p.url),
        metadata: no_metadata,
    },
    Rule {
        key: "slow_load_time",
        category: IssueCategory::Performance,
        can_auto_fix: false,
        recommendation: "Reduce server response time, compress assets and enable caching.",
        triggers: |p| p.load_time_ms > SLOW_LOAD_MS,
        severity: |p| {
            if p.load_time_ms > VERY_SLOW_LOAD_MS {
                Severity::Critical
            } else {
                Severity::High
            }
        },
        description: |p| format!("The page took {} ms to load.", p.load_time_ms),
        metadata: |p| vec![("load_time_ms", p.load_time_ms.to_string())],
    },
];

const CONTENT_RULES: &[Rule] = &[
    Rule {
        key: "thin_content",
        category: IssueCategory::Content,
        can_auto_fix: true,
        recommendation: "Expand the page copy to at least 300 words of useful content.",
        triggers: |p| p.word_count() < THIN_CONTENT_WORDS,
        severity: |_| Severity::High,
        description: |p| {
            format!(
                "The page has only {} words of readable content.",
                p.word_count()
            )
        },
        metadata: |p| vec![("word_count", p.word_count().to_string())],
    },
    Rule {
        key: "images_missing_alt",
        category: IssueCategory::Accessibility,
        can_auto_fix: true,
        recommendation: "Add descriptive alt text to every content image.",
        triggers: |p| missing_alt_count(p) > 0,
        severity: |_| Severity::Medium,
        description: |p| {
            format!(
                "{} of {} images are missing alt text.",
                missing_alt_count(p),
                p.images.len()
            )
        },
        metadata: |p| vec![("missing_alt_count", missing_alt_count(p).to_string())],
    },
];

/// All rules in evaluation order: SEO, then technical/performance, then
/// content/accessibility.
pub fn all_rules() -> impl Iterator<Item = &'static Rule> {
    SEO_RULES
        .iter()
        .chain(TECHNICAL_RULES.iter())
        .chain(CONTENT_RULES.iter())
}

/// Number of rules that report into a category; used by the aggregator
/// to derive pass counts.
pub fn rules_in_category(category: IssueCategory) -> usize {
    all_rules().filter(|rule| rule.category == category).count()
}

/// Classify a single page. Pure and deterministic: identical records
/// always yield identical issue lists, and no state leaks between pages.
pub fn classify(page: &PageRecord) -> Vec<Issue> {
    all_rules().filter_map(|rule| rule.apply(page)).collect()
}

/// Classify every page of a crawl; simple concatenation in page order.
pub fn classify_all(pages: &[PageRecord]) -> Vec<Issue> {
    pages.iter().flat_map(|page| classify(page)).collect()
}
