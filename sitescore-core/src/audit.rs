//! Audit task orchestration: crawl, classify, score.
//!
//! An [`AuditTask`] is created per audit request, owns its status and
//! counters exclusively, and is discarded (or persisted by an external
//! task store) once it reaches a terminal state.

use crate::issues::classify_all;
use crate::score::{aggregate, AnalysisResult};
use serde::{Deserialize, Serialize};
use sitescore_scanner::{CrawlOptions, CrawlOutcome, CrawlProgress, Crawler, ScanError};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Queued,
    Crawling,
    Analyzing,
    Completed,
    Failed,
    Cancelled,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Queued => "queued",
            AuditStatus::Crawling => "crawling",
            AuditStatus::Analyzing => "analyzing",
            AuditStatus::Completed => "completed",
            AuditStatus::Failed => "failed",
            AuditStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuditStatus::Completed | AuditStatus::Failed | AuditStatus::Cancelled
        )
    }

    /// Allowed moves of the task state machine:
    /// queued -> crawling -> analyzing -> completed, with failed and
    /// cancelled reachable from the two active states.
    pub fn can_transition_to(&self, to: AuditStatus) -> bool {
        matches!(
            (self, to),
            (AuditStatus::Queued, AuditStatus::Crawling)
                | (AuditStatus::Crawling, AuditStatus::Analyzing)
                | (AuditStatus::Analyzing, AuditStatus::Completed)
                | (AuditStatus::Crawling, AuditStatus::Failed)
                | (AuditStatus::Analyzing, AuditStatus::Failed)
                | (AuditStatus::Crawling, AuditStatus::Cancelled)
                | (AuditStatus::Analyzing, AuditStatus::Cancelled)
        )
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: AuditStatus, to: AuditStatus },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    pub seed_url: String,
    #[serde(default)]
    pub options: CrawlOptions,
}

/// Progress update forwarded to the external task store after every page
/// attempt; `pages_scanned` is strictly non-decreasing.
#[derive(Debug, Clone)]
pub struct AuditProgress {
    pub pages_scanned: usize,
    pub total_estimate: usize,
    pub current_url: String,
    pub percent: u8,
}

pub type AuditProgressCallback = Arc<dyn Fn(AuditProgress) + Send + Sync>;
pub type StatusCallback = Arc<dyn Fn(AuditStatus) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub crawl: CrawlOutcome,
    pub analysis: AnalysisResult,
}

pub struct AuditTask {
    pub seed_url: String,
    pub options: CrawlOptions,
    status: AuditStatus,
    pages_scanned: usize,
    progress_percent: u8,
    error_message: Option<String>,
    cancel: Arc<AtomicBool>,
    progress_callback: Option<AuditProgressCallback>,
    status_callback: Option<StatusCallback>,
}

impl AuditTask {
    pub fn new(request: AuditRequest) -> Self {
        Self {
            seed_url: request.seed_url,
            options: request.options,
            status: AuditStatus::Queued,
            pages_scanned: 0,
            progress_percent: 0,
            error_message: None,
            cancel: Arc::new(AtomicBool::new(false)),
            progress_callback: None,
            status_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: AuditProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.status_callback = Some(callback);
        self
    }

    pub fn status(&self) -> AuditStatus {
        self.status
    }

    pub fn pages_scanned(&self) -> usize {
        self.pages_scanned
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Cooperative cancellation: checked before each dequeue, in-flight
    /// fetches complete normally.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn transition(&mut self, to: AuditStatus) -> Result<(), AuditError> {
        if !self.status.can_transition_to(to) {
            return Err(AuditError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        info!("Audit of {}: {} -> {}", self.seed_url, self.status.as_str(), to.as_str());
        self.status = to;
        if let Some(ref callback) = self.status_callback {
            callback(to);
        }
        Ok(())
    }

    /// Drive the full audit: crawl, classify, aggregate.
    ///
    /// Network-level failure never surfaces as an error here - a seed
    /// that cannot be reached yields a `Failed` outcome with an error
    /// message, and partial results survive cancellation. `Err` is
    /// reserved for misuse (an invalid seed URL or re-running a
    /// finished task).
    pub async fn run(&mut self) -> Result<AuditOutcome, AuditError> {
        self.transition(AuditStatus::Crawling)?;

        let max_pages = self.options.max_pages.max(1);
        let mut crawler =
            Crawler::new(self.options.clone())?.with_cancel_flag(self.cancel.clone());
        if let Some(ref callback) = self.progress_callback {
            let callback = callback.clone();
            crawler = crawler.with_progress_callback(Arc::new(move |p: CrawlProgress| {
                let percent = ((p.pages_scanned * 100) / max_pages).min(100) as u8;
                callback(AuditProgress {
                    pages_scanned: p.pages_scanned,
                    total_estimate: p.total_estimate,
                    current_url: p.current_url,
                    percent,
                });
            }));
        }

        let crawl = match crawler.crawl(&self.seed_url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.error_message = Some(e.to_string());
                self.transition(AuditStatus::Failed)?;
                return Err(e.into());
            }
        };

        self.pages_scanned = crawl.pages.len() + crawl.failed_urls.len();
        self.progress_percent = ((self.pages_scanned * 100) / max_pages).min(100) as u8;

        let seed_unreachable = crawl.pages.is_empty() && !crawl.failed_urls.is_empty();

        if crawl.cancelled {
            self.transition(AuditStatus::Cancelled)?;
        } else if seed_unreachable {
            self.error_message = Some(format!(
                "seed URL {} could not be reached after {} retries",
                self.seed_url, self.options.retry_count
            ));
            self.transition(AuditStatus::Failed)?;
        } else {
            self.transition(AuditStatus::Analyzing)?;
        }

        // Classification and scoring are total functions; they run even
        // over partial (cancelled or failed) crawls.
        let issues = classify_all(&crawl.pages);
        let analysis = aggregate(&issues, &crawl.pages);

        if self.status == AuditStatus::Analyzing {
            self.transition(AuditStatus::Completed)?;
        }

        Ok(AuditOutcome {
            status: self.status,
            error_message: self.error_message.clone(),
            crawl,
            analysis,
        })
    }
}
