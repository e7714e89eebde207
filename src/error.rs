use thiserror::Error;

/// Why a page could not be fetched; never fatal on its own
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Empty response body for {0}")]
    Empty(String),
    #[error("Browser rendering failed: {0}")]
    Browser(String),
}

/// Conditions that end a crawl run
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Blocked twice in a row while fetching {url}")]
    Blocked { url: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrawlError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, CrawlError::Blocked { .. })
    }
}
