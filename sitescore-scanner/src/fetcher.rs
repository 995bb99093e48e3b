use crate::error::{Result, ScanError};
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!(
    "SitescoreBot/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/sitescore/sitescore)"
);

const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.8";

/// Fixed-delay retry policy applied at the fetch boundary.
///
/// `attempts` is the number of retries after the first try, so
/// `attempts = 2` means up to three requests total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// A successfully fetched response body plus the metadata the extractor
/// and classifier care about.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub load_time: Duration,
}

/// The only component that talks to the network. One GET per call, with
/// redirects followed by the client and retries on transient failures.
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static(ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, retry })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch a URL, retrying failed attempts per the retry policy with a
    /// fixed pause between them. Returns the last error once the policy
    /// is exhausted.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    attempt += 1;
                    warn!(
                        "fetch attempt {}/{} failed for {}: {}",
                        attempt,
                        self.retry.attempts + 1,
                        url,
                        e
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_string());
            }
        }
        let content_type = headers.get("content-type").cloned();

        // Malformed content is never an error here: the body comes back
        // as-is for the caller to parse defensively.
        let body = response.text().await.map_err(|e| ScanError::Network {
            url: url.to_string(),
            message: format!("failed to read body: {}", e),
        })?;

        Ok(FetchedPage {
            status_code: status.as_u16(),
            content_type,
            headers,
            body,
            load_time: start.elapsed(),
        })
    }
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> ScanError {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection refused".to_string()
    } else {
        e.to_string()
    };
    ScanError::Network {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher(retry: RetryPolicy) -> Fetcher {
        Fetcher::new(Duration::from_secs(5), retry).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>hi</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = test_fetcher(RetryPolicy::default());
        let page = fetcher.fetch(&server.uri()).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert!(page.body.contains("hi"));
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_sends_identifying_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(headers("accept-language", ACCEPT_LANGUAGE.split(',').collect()))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(RetryPolicy {
            attempts: 0,
            delay: Duration::from_millis(1),
        });
        fetcher.fetch(&server.uri()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_retries_then_succeeds() {
        let server = MockServer::start().await;

        // Two failures, then success; with attempts = 2 the third request
        // should land.
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(RetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(10),
        });
        let page = fetcher.fetch(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(page.body, "recovered");
    }

    #[tokio::test]
    async fn test_fetch_exhausted_retries_returns_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(RetryPolicy {
            attempts: 1,
            delay: Duration::from_millis(10),
        });
        let err = fetcher
            .fetch(&format!("{}/broken", server.uri()))
            .await
            .unwrap_err();

        match err {
            ScanError::Http { status, .. } => assert_eq!(status, 503),
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Nothing listens on this port.
        let fetcher = test_fetcher(RetryPolicy {
            attempts: 0,
            delay: Duration::from_millis(1),
        });
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, ScanError::Network { .. }));
    }
}
