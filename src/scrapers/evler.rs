use crate::config::Config;
use crate::error::FetchError;
use crate::scrapers::browser::BrowserRenderer;
use crate::scrapers::traits::{CountProbe, PageFetcher};
use crate::scrapers::types::{RenderMode, SearchParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the listing site, with optional headless Chrome for
/// rendered pages and the result-count endpoint
pub struct EvlerClient {
    client: Client,
    renderer: Option<Arc<BrowserRenderer>>,
    count_endpoint: String,
}

impl EvlerClient {
    pub fn new(cfg: &Config, renderer: Option<BrowserRenderer>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("tr-TR,tr;q=0.9,en;q=0.8"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(cfg.user_agent.as_str())
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            renderer: renderer.map(Arc::new),
            count_endpoint: cfg.count_endpoint.clone(),
        })
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching URL: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await?;
        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }

    async fn fetch_rendered(&self, renderer: Arc<BrowserRenderer>, url: &str) -> Result<String, FetchError> {
        let target = url.to_string();
        tokio::task::spawn_blocking(move || renderer.render(&target))
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?
            .map_err(|e| FetchError::Browser(format!("{:#}", e)))
    }
}

#[async_trait]
impl PageFetcher for EvlerClient {
    async fn fetch(&self, url: &str, mode: RenderMode) -> Result<String, FetchError> {
        let html = match (mode, &self.renderer) {
            (RenderMode::Browser, Some(renderer)) => self.fetch_rendered(Arc::clone(renderer), url).await?,
            (RenderMode::Browser, None) => {
                warn!("No browser available, fetching {} without rendering", url);
                self.fetch_raw(url).await?
            }
            (RenderMode::Raw, _) => self.fetch_raw(url).await?,
        };

        if html.trim().is_empty() {
            return Err(FetchError::Empty(url.to_string()));
        }
        Ok(html)
    }

    fn source_name(&self) -> &'static str {
        "101evler"
    }
}

#[async_trait]
impl CountProbe for EvlerClient {
    async fn total_listings(&self, search: &SearchParams) -> Result<u64> {
        let form = search.count_form()?;

        let response = self
            .client
            .post(&self.count_endpoint)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ACCEPT, "*/*")
            .form(&form)
            .send()
            .await
            .context("Failed to reach count endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!("Count endpoint returned status: {}", response.status());
        }

        let body = response.text().await.context("Failed to read count response")?;
        parse_count_body(&body).with_context(|| format!("Count endpoint returned non-numeric body: {:?}", body))
    }
}

/// Plain integer body, tolerating whitespace and grouping separators
pub fn parse_count_body(body: &str) -> Option<u64> {
    let digits: String = body
        .trim()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' '))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_count_bodies() {
        assert_eq!(parse_count_body("61"), Some(61));
        assert_eq!(parse_count_body(" 1.204\n"), Some(1204));
        assert_eq!(parse_count_body("0"), Some(0));
        assert_eq!(parse_count_body(""), None);
        assert_eq!(parse_count_body("<html>error</html>"), None);
    }
}
