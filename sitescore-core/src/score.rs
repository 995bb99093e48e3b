//! Category and overall score aggregation.
//!
//! Each category starts at 100 and loses a fixed penalty per distinct
//! triggered rule - a defect repeated on every page costs the same as a
//! defect on one page. The overall score is a fixed weighted sum.

use crate::issues::{rules_in_category, Issue, IssueCategory, Severity};
use serde::{Deserialize, Serialize};
use sitescore_scanner::PageRecord;
use std::collections::HashSet;

/// Penalty subtracted once per distinct rule of the given severity.
fn penalty(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 30,
        Severity::High => 20,
        Severity::Medium => 10,
        Severity::Low => 5,
    }
}

/// Overall weighting: SEO 40%, technical 40%, the remaining categories
/// split the last 20%.
fn weight(category: IssueCategory) -> f64 {
    match category {
        IssueCategory::Seo => 0.40,
        IssueCategory::Technical => 0.40,
        IssueCategory::Performance => 0.08,
        IssueCategory::Content => 0.07,
        IssueCategory::Accessibility => 0.05,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: u32,
    pub passed: usize,
    pub warning: usize,
    pub failed: usize,
    pub items: Vec<Issue>,
}

impl CategoryScore {
    fn perfect() -> Self {
        Self {
            score: 100,
            passed: 0,
            warning: 0,
            failed: 0,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub overall_score: u32,
    pub seo: CategoryScore,
    pub technical: CategoryScore,
    pub performance: CategoryScore,
    pub content: CategoryScore,
    pub accessibility: CategoryScore,
}

impl AnalysisResult {
    pub fn category(&self, category: IssueCategory) -> &CategoryScore {
        match category {
            IssueCategory::Seo => &self.seo,
            IssueCategory::Technical => &self.technical,
            IssueCategory::Performance => &self.performance,
            IssueCategory::Content => &self.content,
            IssueCategory::Accessibility => &self.accessibility,
        }
    }

    pub fn total_issues(&self) -> usize {
        IssueCategory::ALL
            .iter()
            .map(|c| self.category(*c).items.len())
            .sum()
    }
}

fn score_category(
    category: IssueCategory,
    issues: &[Issue],
    page_count: usize,
) -> CategoryScore {
    let items: Vec<Issue> = issues
        .iter()
        .filter(|issue| issue.category == category)
        .cloned()
        .collect();

    // Penalize each distinct rule key once, at the worst severity it was
    // observed with.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut total_penalty: u32 = 0;
    for issue in &items {
        if seen.insert(issue.issue_type.as_str()) {
            let worst = items
                .iter()
                .filter(|i| i.issue_type == issue.issue_type)
                .map(|i| i.severity)
                .min()
                .unwrap_or(issue.severity);
            total_penalty += penalty(worst);
        }
    }

    let score = 100u32.saturating_sub(total_penalty);

    let failed = items
        .iter()
        .filter(|i| matches!(i.severity, Severity::Critical | Severity::High))
        .count();
    let warning = items.len() - failed;
    let checks = rules_in_category(category) * page_count;
    let passed = checks.saturating_sub(items.len());

    CategoryScore {
        score,
        passed,
        warning,
        failed,
        items,
    }
}

/// Reduce classified issues into per-category scores and a weighted
/// overall score, all clamped to [0, 100].
pub fn aggregate(issues: &[Issue], pages: &[PageRecord]) -> AnalysisResult {
    if pages.is_empty() {
        return AnalysisResult {
            overall_score: 100,
            seo: CategoryScore::perfect(),
            technical: CategoryScore::perfect(),
            performance: CategoryScore::perfect(),
            content: CategoryScore::perfect(),
            accessibility: CategoryScore::perfect(),
        };
    }

    let page_count = pages.len();
    let seo = score_category(IssueCategory::Seo, issues, page_count);
    let technical = score_category(IssueCategory::Technical, issues, page_count);
    let performance = score_category(IssueCategory::Performance, issues, page_count);
    let content = score_category(IssueCategory::Content, issues, page_count);
    let accessibility = score_category(IssueCategory::Accessibility, issues, page_count);

    let overall = [
        (IssueCategory::Seo, seo.score),
        (IssueCategory::Technical, technical.score),
        (IssueCategory::Performance, performance.score),
        (IssueCategory::Content, content.score),
        (IssueCategory::Accessibility, accessibility.score),
    ]
    .iter()
    .map(|(category, score)| f64::from(*score) * weight(*category))
    .sum::<f64>()
    .round() as u32;

    AnalysisResult {
        overall_score: overall.min(100),
        seo,
        technical,
        performance,
        content,
        accessibility,
    }
}
