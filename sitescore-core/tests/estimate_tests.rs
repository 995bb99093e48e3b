// Tests for the heuristic page-count estimator

use sitescore_core::estimate::{parse_product_count, EstimatorConfig, PlatformHint, SiteEstimator};
use sitescore_scanner::{Fetcher, RetryPolicy};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urls(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|p| format!("https://example.com{p}"))
        .collect()
}

// ============================================================================
// Baselines
// ============================================================================

#[tokio::test]
async fn test_unknown_platform_empty_sample_is_baseline() {
    let estimator = SiteEstimator::new();
    let estimate = estimator
        .estimate(PlatformHint::Unknown, &[], "example.com")
        .await;
    assert_eq!(estimate, EstimatorConfig::default().base_estimate(PlatformHint::Unknown));
}

#[tokio::test]
async fn test_estimate_is_always_positive() {
    let estimator = SiteEstimator::new();
    for platform in [
        PlatformHint::Shopify,
        PlatformHint::WordPress,
        PlatformHint::Wix,
        PlatformHint::Unknown,
    ] {
        let estimate = estimator
            .estimate(platform, &urls(&["/a", "/b"]), "example.com")
            .await;
        assert!(estimate > 0);
    }
}

#[test]
fn test_platform_hint_parsing() {
    assert_eq!(PlatformHint::parse("Shopify"), PlatformHint::Shopify);
    assert_eq!(PlatformHint::parse(" woocommerce "), PlatformHint::WooCommerce);
    assert_eq!(PlatformHint::parse("something else"), PlatformHint::Unknown);
    assert!(PlatformHint::Magento.is_storefront());
    assert!(!PlatformHint::WordPress.is_storefront());
}

// ============================================================================
// Pattern heuristics (ordering only - the constants are placeholders)
// ============================================================================

#[tokio::test]
async fn test_product_ratio_raises_estimate() {
    let estimator = SiteEstimator::new();
    let plain = estimator
        .estimate(PlatformHint::Unknown, &urls(&["/about", "/contact"]), "example.com")
        .await;
    let producty = estimator
        .estimate(
            PlatformHint::Unknown,
            &urls(&["/product/shoe", "/product/hat"]),
            "example.com",
        )
        .await;
    assert!(producty > plain);
}

#[tokio::test]
async fn test_pagination_multiplies_estimate() {
    let estimator = SiteEstimator::new();
    let without = estimator
        .estimate(PlatformHint::Unknown, &urls(&["/blog/post"]), "example.com")
        .await;
    let with = estimator
        .estimate(
            PlatformHint::Unknown,
            &urls(&["/blog/post", "/blog/page/2"]),
            "example.com",
        )
        .await;
    assert!(with > without);
}

#[tokio::test]
async fn test_shop_domain_imposes_floor() {
    let estimator = SiteEstimator::new();
    let estimate = estimator
        .estimate(PlatformHint::Unknown, &[], "my-shop.example.com")
        .await;
    assert!(estimate >= EstimatorConfig::default().shop_keyword_floor);
}

// ============================================================================
// Product-count probe
// ============================================================================

#[test]
fn test_parse_product_count() {
    assert_eq!(parse_product_count("Showing 1,234 products"), Some(1234));
    assert_eq!(parse_product_count("All 42 Products on sale"), Some(42));
    assert_eq!(parse_product_count("our products are great"), None);
    assert_eq!(parse_product_count(""), None);
}

#[tokio::test]
async fn test_probe_reads_visible_product_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Browse all 200 products</body></html>"),
        )
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(Duration::from_secs(5), RetryPolicy::default()).unwrap();
    let estimator = SiteEstimator::new().with_probe(fetcher);
    let estimate = estimator
        .estimate(PlatformHint::Shopify, &[], &server.uri())
        .await;

    // 200 products * 1.15 listing overhead
    assert_eq!(estimate, 230);
}

#[tokio::test]
async fn test_probe_failure_falls_back_to_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(
        Duration::from_secs(5),
        RetryPolicy {
            attempts: 0,
            delay: Duration::from_millis(1),
        },
    )
    .unwrap();
    let estimator = SiteEstimator::new().with_probe(fetcher);
    let estimate = estimator
        .estimate(PlatformHint::Shopify, &[], &server.uri())
        .await;

    assert_eq!(
        estimate,
        EstimatorConfig::default().base_estimate(PlatformHint::Shopify)
    );
}
