pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod page;

pub use crawler::{CrawlOptions, CrawlOutcome, CrawlProgress, CrawlSummary, Crawler, ProgressCallback};
pub use error::ScanError;
pub use fetcher::{FetchedPage, Fetcher, RetryPolicy};
pub use page::{Headings, ImageRef, PageRecord};
