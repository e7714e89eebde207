use crate::error::FetchError;
use crate::scrapers::types::{RenderMode, SearchParams};
use anyhow::Result;
use async_trait::async_trait;

/// Source of page HTML.
/// Implemented over HTTP and headless Chrome, and by in-memory fakes in tests
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page; a failure here only skips that page
    async fn fetch(&self, url: &str, mode: RenderMode) -> Result<String, FetchError>;

    /// Get the name of the fetcher
    fn source_name(&self) -> &'static str;
}

/// Authoritative result count for a search
#[async_trait]
pub trait CountProbe: Send + Sync {
    async fn total_listings(&self, search: &SearchParams) -> Result<u64>;
}
