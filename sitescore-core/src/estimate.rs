//! Heuristic page-count estimation for sites too large to crawl fully.
//!
//! All tuning constants live in one [`EstimatorConfig`] table. The
//! pattern-ratio scaling is a placeholder heuristic: the only property
//! relied upon is that a larger pattern ratio yields a larger estimate.

use sitescore_scanner::Fetcher;
use tracing::debug;

const PRODUCT_PATTERNS: &[&str] = &["/product/", "/products/", "/item/", "/p/"];
const CATEGORY_PATTERNS: &[&str] = &["/category/", "/categories/", "/collections/", "/c/", "/shop/"];
const PAGINATION_PATTERNS: &[&str] = &["/page/", "?page=", "&page="];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformHint {
    Shopify,
    WooCommerce,
    Magento,
    BigCommerce,
    WordPress,
    Drupal,
    Wix,
    Squarespace,
    Unknown,
}

impl PlatformHint {
    pub fn parse(hint: &str) -> Self {
        match hint.trim().to_lowercase().as_str() {
            "shopify" => PlatformHint::Shopify,
            "woocommerce" => PlatformHint::WooCommerce,
            "magento" => PlatformHint::Magento,
            "bigcommerce" => PlatformHint::BigCommerce,
            "wordpress" => PlatformHint::WordPress,
            "drupal" => PlatformHint::Drupal,
            "wix" => PlatformHint::Wix,
            "squarespace" => PlatformHint::Squarespace,
            _ => PlatformHint::Unknown,
        }
    }

    pub fn is_storefront(&self) -> bool {
        matches!(
            self,
            PlatformHint::Shopify
                | PlatformHint::WooCommerce
                | PlatformHint::Magento
                | PlatformHint::BigCommerce
        )
    }
}

/// Tuning table for the estimator. Constants are empirical placeholders,
/// kept together so platform tuning never touches traversal logic.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Overhead multiplier applied on top of a known product count, to
    /// account for category and listing pages.
    pub product_overhead: f64,
    /// Ceiling the product-pattern ratio is scaled against.
    pub product_scale: f64,
    /// Smaller ceiling for the category-pattern ratio.
    pub category_scale: f64,
    /// Applied once when any pagination pattern is present.
    pub pagination_multiplier: f64,
    /// Per-level increment of the path-depth factor.
    pub depth_increment: f64,
    /// Floor imposed when the domain itself sounds like a storefront.
    pub shop_keyword_floor: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            product_overhead: 1.15,
            product_scale: 60_000.0,
            category_scale: 5_000.0,
            pagination_multiplier: 1.5,
            depth_increment: 0.15,
            shop_keyword_floor: 1_000,
        }
    }
}

impl EstimatorConfig {
    pub fn base_estimate(&self, platform: PlatformHint) -> u64 {
        match platform {
            PlatformHint::Shopify => 1_000,
            PlatformHint::WooCommerce => 800,
            PlatformHint::Magento => 2_000,
            PlatformHint::BigCommerce => 800,
            PlatformHint::WordPress => 300,
            PlatformHint::Drupal => 400,
            PlatformHint::Wix => 100,
            PlatformHint::Squarespace => 100,
            PlatformHint::Unknown => 150,
        }
    }
}

/// Projects the likely total page count of a site from a URL sample and
/// platform signals. Side-effect-free except for one optional probe
/// fetch on storefront platforms.
pub struct SiteEstimator {
    config: EstimatorConfig,
    probe: Option<Fetcher>,
}

impl SiteEstimator {
    pub fn new() -> Self {
        Self {
            config: EstimatorConfig::default(),
            probe: None,
        }
    }

    pub fn with_config(mut self, config: EstimatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_probe(mut self, fetcher: Fetcher) -> Self {
        self.probe = Some(fetcher);
        self
    }

    /// Never fails and never returns zero: probe errors fall back to the
    /// pattern-based estimate, and the platform baseline is the floor.
    pub async fn estimate(
        &self,
        platform: PlatformHint,
        sample_urls: &[String],
        domain: &str,
    ) -> u64 {
        if platform.is_storefront()
            && let Some(count) = self.probe_product_count(domain).await
        {
            let estimate = (count as f64 * self.config.product_overhead).round() as u64;
            debug!(
                "Estimated {} pages for {} from visible product count {}",
                estimate, domain, count
            );
            return estimate.max(1);
        }

        let estimate = self.estimate_from_patterns(platform, sample_urls, domain);
        debug!("Estimated {} pages for {} from URL patterns", estimate, domain);
        estimate
    }

    fn estimate_from_patterns(
        &self,
        platform: PlatformHint,
        sample_urls: &[String],
        domain: &str,
    ) -> u64 {
        let base = self.config.base_estimate(platform) as f64;

        let sample_size = sample_urls.len();
        let (product_ratio, category_ratio, pagination_ratio) = if sample_size == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let hits = |patterns: &[&str]| {
                sample_urls
                    .iter()
                    .filter(|url| patterns.iter().any(|pat| url.contains(pat)))
                    .count() as f64
                    / sample_size as f64
            };
            (
                hits(PRODUCT_PATTERNS),
                hits(CATEGORY_PATTERNS),
                hits(PAGINATION_PATTERNS),
            )
        };

        let mut estimate = base
            + product_ratio * self.config.product_scale
            + category_ratio * self.config.category_scale;

        if pagination_ratio > 0.0 {
            estimate *= self.config.pagination_multiplier;
        }

        let max_depth = sample_urls
            .iter()
            .map(|url| path_depth(url))
            .max()
            .unwrap_or(0);
        if max_depth > 1 {
            estimate *= 1.0 + self.config.depth_increment * (max_depth - 1) as f64;
        }

        let mut result = estimate.round() as u64;

        let domain_lower = domain.to_lowercase();
        if domain_lower.contains("shop") || domain_lower.contains("store") {
            result = result.max(self.config.shop_keyword_floor);
        }

        result.max(1)
    }

    async fn probe_product_count(&self, domain: &str) -> Option<u64> {
        let fetcher = self.probe.as_ref()?;
        let url = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}/", domain)
        };

        match fetcher.fetch(&url).await {
            Ok(page) => parse_product_count(&page.body),
            Err(e) => {
                debug!("Product-count probe of {} failed: {}", url, e);
                None
            }
        }
    }
}

impl Default for SiteEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of non-empty path segments of a URL; 0 when unparsable.
fn path_depth(url: &str) -> usize {
    url::Url::parse(url)
        .ok()
        .map(|u| u.path().split('/').filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

/// Scan visible text for "N products" phrasing and return N.
pub fn parse_product_count(text: &str) -> Option<u64> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let word = token
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_lowercase();
        if (word == "products" || word == "product" || word == "items") && i > 0 {
            let number: String = tokens[i - 1]
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            if let Ok(count) = number.parse::<u64>()
                && count > 0
            {
                return Some(count);
            }
        }
    }
    None
}
