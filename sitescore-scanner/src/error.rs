use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Errors worth another attempt at the fetch boundary. Everything
    /// transient (timeouts, resets) and server-side failures qualify;
    /// malformed URLs never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::Network { .. } | ScanError::Http { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
