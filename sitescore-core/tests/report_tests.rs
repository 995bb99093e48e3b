// Tests for report and export generation

use sitescore_core::audit::{AuditOutcome, AuditStatus};
use sitescore_core::issues::classify_all;
use sitescore_core::report::{pages_json, sitemap_xml, text_summary, write_audit_bundle};
use sitescore_core::score::aggregate;
use sitescore_scanner::crawler::{CrawlOutcome, CrawlSummary};
use sitescore_scanner::PageRecord;

fn sample_outcome() -> AuditOutcome {
    let mut first = PageRecord::empty("https://example.com/".to_string(), 200, 300, 0);
    first.title = Some("Home".to_string());
    let second = PageRecord::empty(
        "https://example.com/search?q=a&page=2".to_string(),
        200,
        500,
        1,
    );

    let pages = vec![first, second];
    let issues = classify_all(&pages);
    let analysis = aggregate(&issues, &pages);

    AuditOutcome {
        status: AuditStatus::Completed,
        error_message: None,
        crawl: CrawlOutcome {
            summary: CrawlSummary {
                total_pages: pages.len(),
                internal_links: 3,
                external_links: 1,
                broken_links: 0,
                average_load_time_ms: 400,
            },
            pages,
            failed_urls: Vec::new(),
            cancelled: false,
        },
        analysis,
    }
}

// ============================================================================
// Sitemap XML
// ============================================================================

#[test]
fn test_sitemap_one_entry_per_page() {
    let outcome = sample_outcome();
    let xml = sitemap_xml(&outcome.crawl.pages);

    assert!(xml.starts_with("<?xml version=\"1.0\""));
    assert_eq!(xml.matches("<url>").count(), 2);
    assert_eq!(xml.matches("<changefreq>monthly</changefreq>").count(), 2);
    assert_eq!(xml.matches("<priority>0.8</priority>").count(), 2);
    assert!(xml.contains("<loc>https://example.com/</loc>"));
}

#[test]
fn test_sitemap_escapes_ampersands() {
    let outcome = sample_outcome();
    let xml = sitemap_xml(&outcome.crawl.pages);
    assert!(xml.contains("https://example.com/search?q=a&amp;page=2"));
    assert!(!xml.contains("q=a&page"));
}

#[test]
fn test_sitemap_empty_crawl_is_valid() {
    let xml = sitemap_xml(&[]);
    assert!(xml.contains("<urlset"));
    assert!(xml.contains("</urlset>"));
    assert_eq!(xml.matches("<url>").count(), 0);
}

// ============================================================================
// JSON dump
// ============================================================================

#[test]
fn test_pages_json_round_trips() {
    let outcome = sample_outcome();
    let json = pages_json(&outcome.crawl.pages).unwrap();
    let parsed: Vec<PageRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].url, "https://example.com/");
    assert_eq!(parsed[0].title.as_deref(), Some("Home"));
}

// ============================================================================
// Text summary
// ============================================================================

#[test]
fn test_text_summary_sections() {
    let outcome = sample_outcome();
    let report = text_summary(&outcome);

    assert!(report.contains("# Audit Summary"));
    assert!(report.contains("Status: completed"));
    assert!(report.contains("# Categories"));
    assert!(report.contains("seo"));
    assert!(report.contains("Pages crawled: 2"));
    // The bare second page is missing its meta description.
    assert!(report.contains("missing_meta_description"));
}

#[test]
fn test_text_summary_orders_issues_by_severity() {
    let outcome = sample_outcome();
    let report = text_summary(&outcome);

    let critical = report.find("[critical]");
    let low = report.find("[low]");
    if let (Some(critical), Some(low)) = (critical, low) {
        assert!(critical < low);
    }
}

// ============================================================================
// Bundle
// ============================================================================

#[test]
fn test_write_audit_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = sample_outcome();
    write_audit_bundle(dir.path(), &outcome).unwrap();

    assert!(dir.path().join("sitemap.xml").exists());
    assert!(dir.path().join("pages.json").exists());
    assert!(dir.path().join("summary.txt").exists());
    assert!(dir.path().join("pages").join("page_0000.json").exists());
    assert!(dir.path().join("pages").join("page_0001.json").exists());

    let json = std::fs::read_to_string(dir.path().join("pages.json")).unwrap();
    let parsed: Vec<PageRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), 2);
}
