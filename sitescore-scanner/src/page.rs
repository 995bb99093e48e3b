use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image reference found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: Option<String>,
}

/// Heading text per level, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub h4: Vec<String>,
}

/// Everything extracted from a single fetched page. Immutable once built;
/// a crawl result owns exactly one record per distinct URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub canonical: Option<String>,
    pub headings: Headings,
    pub links: Vec<String>,
    pub images: Vec<ImageRef>,
    pub raw_text: String,
    pub status_code: u16,
    pub load_time_ms: u64,
    pub is_indexable: bool,
    pub depth: usize,
    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// An empty record for a URL, with every extracted field absent.
    pub fn empty(url: String, status_code: u16, load_time_ms: u64, depth: usize) -> Self {
        Self {
            url,
            title: None,
            meta_description: None,
            meta_keywords: None,
            canonical: None,
            headings: Headings::default(),
            links: Vec::new(),
            images: Vec::new(),
            raw_text: String::new(),
            status_code,
            load_time_ms,
            is_indexable: true,
            depth,
            fetched_at: Utc::now(),
        }
    }

    /// Whitespace-delimited token count of the readable text.
    pub fn word_count(&self) -> usize {
        self.raw_text.split_whitespace().count()
    }
}
