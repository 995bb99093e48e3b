use crate::error::{Result, ScanError};
use crate::extractor::extract_page;
use crate::fetcher::{Fetcher, RetryPolicy};
use crate::page::PageRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use texting_robots::Robot;
use tracing::{debug, info, warn};
use url::Url;

/// Progress emitted after every page attempt, success or failure.
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    pub pages_scanned: usize,
    pub total_estimate: usize,
    pub current_url: String,
}

pub type ProgressCallback = Arc<dyn Fn(CrawlProgress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub max_pages: usize,
    pub max_depth: Option<usize>,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub retry_count: u32,
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
    pub respect_robots: bool,
    pub follow_external_links: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_depth: None,
            timeout: Duration::from_secs(10),
            retry_count: 2,
            retry_delay: Duration::from_millis(500),
            respect_robots: false,
            follow_external_links: false,
        }
    }
}

impl CrawlOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_count,
            delay: self.retry_delay,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Aggregate counts produced once traversal terminates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub total_pages: usize,
    pub internal_links: usize,
    pub external_links: usize,
    pub broken_links: usize,
    pub average_load_time_ms: u64,
}

/// Everything a finished (or cancelled) crawl produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub pages: Vec<PageRecord>,
    pub failed_urls: Vec<String>,
    pub summary: CrawlSummary,
    pub cancelled: bool,
}

/// Breadth-first frontier controller. Owns its frontier, visited set and
/// counters exclusively; one instance per crawl task, never shared.
///
/// Traversal is strictly sequential: a single fetch is in flight at a
/// time, which bounds the outbound request rate to the target host.
pub struct Crawler {
    fetcher: Fetcher,
    options: CrawlOptions,
    progress_callback: Option<ProgressCallback>,
    cancel: Arc<AtomicBool>,
}

impl Crawler {
    pub fn new(options: CrawlOptions) -> Result<Self> {
        let fetcher = Fetcher::new(options.timeout, options.retry_policy())?;
        Ok(Self {
            fetcher,
            options,
            progress_callback: None,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Shared flag for cooperative cancellation. Setting it stops the
    /// crawl before the next dequeue; the in-flight fetch completes and
    /// collected pages are preserved.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Use an externally owned cancellation flag instead of the default
    /// crawler-local one.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub async fn crawl(&self, seed_url: &str) -> Result<CrawlOutcome> {
        let seed = Url::parse(seed_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed_url, e)))?;
        let base_host = seed
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: missing host", seed_url)))?
            .to_string();

        info!(
            "Starting crawl of {} (max {} pages)",
            seed_url, self.options.max_pages
        );

        let robot = if self.options.respect_robots {
            self.load_robots(&seed).await
        } else {
            None
        };

        let seed_normalized = {
            let mut url = seed.clone();
            url.set_fragment(None);
            url.to_string()
        };

        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        let mut enqueued: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();

        frontier.push_back((seed_normalized.clone(), 0));
        enqueued.insert(seed_normalized);

        let mut pages: Vec<PageRecord> = Vec::new();
        let mut failed_urls: Vec<String> = Vec::new();
        let mut pages_scanned = 0usize;
        let mut cancelled = false;

        while let Some((url, depth)) = frontier.pop_front() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Crawl cancelled after {} pages", pages.len());
                cancelled = true;
                break;
            }
            if pages_scanned >= self.options.max_pages {
                break;
            }
            if !visited.insert(url.clone()) {
                continue;
            }
            if let Some(ref robot) = robot
                && !robot.allowed(&url)
            {
                debug!("Skipping {} (disallowed by robots.txt)", url);
                continue;
            }

            pages_scanned += 1;

            match self.fetcher.fetch(&url).await {
                Ok(fetched) => {
                    let record =
                        extract_page(&url, &fetched.body, fetched.status_code, fetched.load_time, depth);

                    for link in &record.links {
                        if !self.in_scope(link, &base_host) {
                            continue;
                        }
                        if let Some(max_depth) = self.options.max_depth
                            && depth + 1 > max_depth
                        {
                            continue;
                        }
                        if !visited.contains(link) && enqueued.insert(link.clone()) {
                            frontier.push_back((link.clone(), depth + 1));
                        }
                    }

                    pages.push(record);
                }
                Err(e) => {
                    warn!("Giving up on {}: {}", url, e);
                    failed_urls.push(url.clone());
                }
            }

            if let Some(ref callback) = self.progress_callback {
                callback(CrawlProgress {
                    pages_scanned,
                    total_estimate: self.options.max_pages,
                    current_url: url,
                });
            }
        }

        let summary = summarize(&pages, &failed_urls, &base_host);
        info!(
            "Crawl of {} finished: {} pages, {} failed",
            seed_url,
            pages.len(),
            failed_urls.len()
        );

        Ok(CrawlOutcome {
            pages,
            failed_urls,
            summary,
            cancelled,
        })
    }

    fn in_scope(&self, link: &str, base_host: &str) -> bool {
        if self.options.follow_external_links {
            return true;
        }
        is_same_host(link, base_host)
    }

    /// A robots.txt that cannot be fetched or parsed leaves the crawl
    /// unrestricted rather than blocking it.
    async fn load_robots(&self, seed: &Url) -> Option<Robot> {
        let mut robots_url = seed.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        match self.fetcher.fetch(robots_url.as_str()).await {
            Ok(fetched) => match Robot::new("SitescoreBot", fetched.body.as_bytes()) {
                Ok(robot) => Some(robot),
                Err(e) => {
                    debug!("Unparsable robots.txt at {}: {}", robots_url, e);
                    None
                }
            },
            Err(e) => {
                debug!("No robots.txt at {}: {}", robots_url, e);
                None
            }
        }
    }
}

pub fn is_same_host(url: &str, base_host: &str) -> bool {
    if let Ok(parsed) = Url::parse(url)
        && let Some(host) = parsed.host_str()
    {
        return host == base_host || host.ends_with(&format!(".{}", base_host));
    }
    false
}

fn summarize(pages: &[PageRecord], failed_urls: &[String], base_host: &str) -> CrawlSummary {
    let mut internal_links = 0;
    let mut external_links = 0;
    for page in pages {
        for link in &page.links {
            if is_same_host(link, base_host) {
                internal_links += 1;
            } else {
                external_links += 1;
            }
        }
    }

    let average_load_time_ms = if pages.is_empty() {
        0
    } else {
        pages.iter().map(|p| p.load_time_ms).sum::<u64>() / pages.len() as u64
    };

    CrawlSummary {
        total_pages: pages.len(),
        internal_links,
        external_links,
        broken_links: failed_urls.len(),
        average_load_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(format!("<html><body>{}</body></html>", body))
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(body))
            .mount(server)
            .await;
    }

    fn fast_options(max_pages: usize) -> CrawlOptions {
        CrawlOptions {
            max_pages,
            retry_count: 0,
            retry_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            ..CrawlOptions::default()
        }
    }

    /// Page 1 links to pages 2 and 3, page 2 links back to page 1:
    /// exactly three records, no duplicate fetch, no infinite loop.
    #[tokio::test]
    async fn test_cycle_visited_once() {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount_page(
            &server,
            "/",
            &format!(r#"<a href="{uri}/two">2</a><a href="{uri}/three">3</a>"#),
        )
        .await;
        mount_page(&server, "/two", &format!(r#"<a href="{uri}/">back</a>"#)).await;
        mount_page(&server, "/three", "leaf").await;

        let crawler = Crawler::new(fast_options(50)).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages.len(), 3);
        assert!(outcome.failed_urls.is_empty());

        let mut urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 3, "page URLs must be pairwise distinct");
    }

    #[tokio::test]
    async fn test_max_pages_cap() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let mut links = String::new();
        for i in 0..10 {
            links.push_str(&format!(r#"<a href="{uri}/p{i}">p{i}</a>"#));
            mount_page(&server, &format!("/p{i}"), "leaf").await;
        }
        mount_page(&server, "/", &links).await;

        let crawler = Crawler::new(fast_options(3)).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert!(outcome.pages.len() <= 3);
        assert_eq!(outcome.summary.total_pages, outcome.pages.len());
    }

    /// BFS ordering: a page only reachable through a depth-1 page is
    /// recorded at depth 2, and depth never decreases along the result.
    #[tokio::test]
    async fn test_bfs_depth_recorded() {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount_page(&server, "/", &format!(r#"<a href="{uri}/a">a</a>"#)).await;
        mount_page(&server, "/a", &format!(r#"<a href="{uri}/b">b</a>"#)).await;
        mount_page(&server, "/b", "leaf").await;

        let crawler = Crawler::new(fast_options(50)).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        let depth_of = |suffix: &str| {
            outcome
                .pages
                .iter()
                .find(|p| p.url.ends_with(suffix))
                .map(|p| p.depth)
                .unwrap()
        };
        assert_eq!(depth_of("/a"), 1);
        assert_eq!(depth_of("/b"), 2);

        let depths: Vec<usize> = outcome.pages.iter().map(|p| p.depth).collect();
        let mut sorted = depths.clone();
        sorted.sort();
        assert_eq!(depths, sorted, "pages must be visited in BFS order");
    }

    /// One URL in a five-URL frontier fails every retry: four records,
    /// that one URL in failed_urls, crawl keeps going.
    #[tokio::test]
    async fn test_failed_fetch_is_non_fatal() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let mut links = String::new();
        for route in ["/one", "/two", "/three", "/four"] {
            links.push_str(&format!(r#"<a href="{uri}{route}">x</a>"#));
        }
        mount_page(&server, "/", &links).await;
        mount_page(&server, "/one", "ok").await;
        Mock::given(method("GET"))
            .and(path("/two"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_page(&server, "/three", "ok").await;
        mount_page(&server, "/four", "ok").await;

        let options = CrawlOptions {
            retry_count: 2,
            retry_delay: Duration::from_millis(5),
            ..fast_options(10)
        };
        let crawler = Crawler::new(options).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages.len(), 4);
        assert_eq!(outcome.failed_urls, vec![format!("{uri}/two")]);
        assert_eq!(outcome.summary.broken_links, 1);
    }

    #[tokio::test]
    async fn test_external_links_not_followed() {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount_page(
            &server,
            "/",
            r#"<a href="https://elsewhere.example.org/">offsite</a>"#,
        )
        .await;

        let crawler = Crawler::new(fast_options(10)).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(outcome.summary.external_links, 1);
        assert_eq!(outcome.summary.internal_links, 0);
    }

    #[tokio::test]
    async fn test_max_depth_limits_enqueue() {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount_page(&server, "/", &format!(r#"<a href="{uri}/a">a</a>"#)).await;
        mount_page(&server, "/a", &format!(r#"<a href="{uri}/b">b</a>"#)).await;
        mount_page(&server, "/b", "leaf").await;

        let options = CrawlOptions {
            max_depth: Some(1),
            ..fast_options(10)
        };
        let crawler = Crawler::new(options).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages.len(), 2);
        assert!(!outcome.pages.iter().any(|p| p.url.ends_with("/b")));
    }

    #[tokio::test]
    async fn test_cancellation_preserves_collected_pages() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_page(&server, "/", "never fetched").await;

        let crawler = Crawler::new(fast_options(10)).unwrap();
        crawler.cancel_handle().store(true, Ordering::Relaxed);
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.pages.is_empty());
    }

    #[tokio::test]
    async fn test_progress_emitted_for_every_attempt() {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount_page(&server, "/", &format!(r#"<a href="{uri}/missing">x</a>"#)).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let seen: Arc<std::sync::Mutex<Vec<usize>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let crawler = Crawler::new(fast_options(10))
            .unwrap()
            .with_progress_callback(Arc::new(move |progress: CrawlProgress| {
                seen_clone.lock().unwrap().push(progress.pages_scanned);
            }));

        crawler.crawl(&uri).await.unwrap();

        let counts = seen.lock().unwrap();
        // One event per attempt, including the failed 404, non-decreasing.
        assert_eq!(*counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_robots_disallow_skips_url() {
        let server = MockServer::start().await;
        let uri = server.uri();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private\n"),
            )
            .mount(&server)
            .await;
        mount_page(&server, "/", &format!(r#"<a href="{uri}/private">p</a>"#)).await;
        mount_page(&server, "/private", "hidden").await;

        let options = CrawlOptions {
            respect_robots: true,
            ..fast_options(10)
        };
        let crawler = Crawler::new(options).unwrap();
        let outcome = crawler.crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages.len(), 1);
        assert!(outcome.failed_urls.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected() {
        let crawler = Crawler::new(fast_options(10)).unwrap();
        assert!(matches!(
            crawler.crawl("not a url").await,
            Err(ScanError::InvalidUrl(_))
        ));
    }
}
