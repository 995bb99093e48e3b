pub mod audit;
pub mod estimate;
pub mod issues;
pub mod report;
pub mod score;

pub use audit::{AuditOutcome, AuditRequest, AuditStatus, AuditTask};
pub use estimate::{EstimatorConfig, PlatformHint, SiteEstimator};
pub use issues::{classify, classify_all, Issue, IssueCategory, Severity};
pub use score::{aggregate, AnalysisResult, CategoryScore};
