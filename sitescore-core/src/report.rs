//! Report and export generation from audit results.
//!
//! Everything here produces data for the external report renderers: a
//! sitemap XML document, a JSON dump of all page records, a plain-text
//! summary, and a directory bundle combining them.

use crate::audit::AuditOutcome;
use crate::issues::IssueCategory;
use sitescore_scanner::PageRecord;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// One `<url>` entry per crawled page, fixed change frequency and
/// priority as the dashboard expects.
pub fn sitemap_xml(pages: &[PageRecord]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for page in pages {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&page.url)));
        xml.push_str("    <changefreq>monthly</changefreq>\n");
        xml.push_str("    <priority>0.8</priority>\n");
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

/// JSON dump of every page record in the crawl.
pub fn pages_json(pages: &[PageRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(pages)
}

/// Human-readable audit summary: scores, crawl counts, then issues
/// ordered by severity.
pub fn text_summary(outcome: &AuditOutcome) -> String {
    let mut report = String::new();
    let summary = &outcome.crawl.summary;

    report.push_str("# Audit Summary\n");
    report.push_str(&format!("  Status: {}\n", outcome.status.as_str()));
    if let Some(ref message) = outcome.error_message {
        report.push_str(&format!("  Error: {}\n", message));
    }
    report.push_str(&format!("  Overall score: {}/100\n\n", outcome.analysis.overall_score));

    report.push_str("# Categories\n");
    for category in IssueCategory::ALL {
        let score = outcome.analysis.category(category);
        report.push_str(&format!(
            "  {:<14} {:>3}/100  ({} passed, {} warnings, {} failed)\n",
            category.as_str(),
            score.score,
            score.passed,
            score.warning,
            score.failed,
        ));
    }

    report.push_str("\n# Crawl\n");
    report.push_str(&format!("  Pages crawled: {}\n", summary.total_pages));
    report.push_str(&format!("  Internal links: {}\n", summary.internal_links));
    report.push_str(&format!("  External links: {}\n", summary.external_links));
    report.push_str(&format!("  Broken links: {}\n", summary.broken_links));
    report.push_str(&format!(
        "  Average load time: {} ms\n",
        summary.average_load_time_ms
    ));
    if !outcome.crawl.failed_urls.is_empty() {
        report.push_str("  Failed URLs:\n");
        for url in &outcome.crawl.failed_urls {
            report.push_str(&format!("    - {}\n", url));
        }
    }

    let mut issues: Vec<_> = IssueCategory::ALL
        .iter()
        .flat_map(|c| outcome.analysis.category(*c).items.iter())
        .collect();
    issues.sort_by_key(|issue| issue.severity);

    report.push_str(&format!("\n# Issues ({})\n", issues.len()));
    for issue in issues {
        report.push_str(&format!(
            "  [{}] {} ({}) - {}\n      {}\n",
            issue.severity.as_str(),
            issue.issue_type,
            issue.category.as_str(),
            issue.affected_url,
            issue.description,
        ));
    }

    report
}

/// Write the full audit bundle into a directory: sitemap, JSON dump,
/// text summary, and one JSON document per page.
pub fn write_audit_bundle(dir: &Path, outcome: &AuditOutcome) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;

    fs::write(dir.join("sitemap.xml"), sitemap_xml(&outcome.crawl.pages))?;
    fs::write(dir.join("summary.txt"), text_summary(outcome))?;

    let json = pages_json(&outcome.crawl.pages)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(dir.join("pages.json"), json)?;

    let pages_dir = dir.join("pages");
    fs::create_dir_all(&pages_dir)?;
    for (index, page) in outcome.crawl.pages.iter().enumerate() {
        let json = serde_json::to_string_pretty(page)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = fs::File::create(pages_dir.join(format!("page_{:04}.json", index)))?;
        file.write_all(json.as_bytes())?;
    }

    info!(
        "Wrote audit bundle ({} pages) to {}",
        outcome.crawl.pages.len(),
        dir.display()
    );
    Ok(())
}
