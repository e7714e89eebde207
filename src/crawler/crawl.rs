//! Search-page pagination and batched listing downloads.

use crate::config::Config;
use crate::crawler::frontier::CrawlFrontier;
use crate::error::CrawlError;
use crate::parser::{partition, BlockDetector, PageCountResolver, PatternMatcher};
use crate::scrapers::{CountProbe, PageFetcher, RenderMode};
use crate::storage::snapshots;
use anyhow::Context;
use futures::future::join_all;
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Totals of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub total_pages: u32,
    pub pages_processed: u32,
    pub discovered: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_log: PathBuf,
}

enum ListingOutcome {
    Saved,
    Failed(String),
    Blocked(String),
}

pub struct Crawler<'a> {
    cfg: &'a Config,
    fetcher: &'a dyn PageFetcher,
    probe: &'a dyn CountProbe,
    blocks: BlockDetector,
    matcher: PatternMatcher,
    resolver: PageCountResolver,
}

impl<'a> Crawler<'a> {
    pub fn new(cfg: &'a Config, fetcher: &'a dyn PageFetcher, probe: &'a dyn CountProbe) -> anyhow::Result<Self> {
        let host = cfg.domain_host()?;
        Ok(Self {
            cfg,
            fetcher,
            probe,
            blocks: BlockDetector::new(&cfg.block_phrases),
            matcher: PatternMatcher::for_search(&host, &cfg.search)?,
            resolver: PageCountResolver::from_config(cfg),
        })
    }

    /// Fetch a page, backing off once if the response is a block page.
    ///
    /// `Ok(None)` is a plain fetch failure. A second block in a row for the
    /// same URL is `CrawlError::Blocked`.
    pub async fn fetch_guarded(&self, url: &str, mode: RenderMode) -> Result<Option<String>, CrawlError> {
        match self.fetcher.fetch(url, mode).await {
            Ok(html) if !self.blocks.is_blocked(&html) => return Ok(Some(html)),
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                return Ok(None);
            }
        }

        warn!(
            "Block page detected at {}, cooling down for {:?} before retrying",
            url, self.cfg.block_cooldown
        );
        sleep(self.cfg.block_cooldown).await;

        match self.fetcher.fetch(url, mode).await {
            Ok(html) if self.blocks.is_blocked(&html) => {
                error!("Still blocked after cooldown at {}", url);
                Err(CrawlError::Blocked { url: url.to_string() })
            }
            Ok(html) => {
                info!("Recovered from block at {}", url);
                Ok(Some(html))
            }
            Err(e) => {
                warn!("Failed to fetch {} after cooldown: {}", url, e);
                Ok(None)
            }
        }
    }

    /// Saved snapshot of a search page, or a fresh rendered fetch which is then saved
    async fn search_page(&self, page: u32) -> Result<Option<String>, CrawlError> {
        let path = snapshots::search_page_path(&self.cfg.pages_dir, page, RenderMode::Browser);
        if let Some(html) = snapshots::read_snapshot(&path).await {
            debug!("Using saved search page {}", path.display());
            return Ok(Some(html));
        }

        if page > 1 {
            sleep(self.cfg.page_delay).await;
        }

        let url = self.cfg.search.search_url(&self.cfg.domain, page);
        info!("Fetching search page {}: {}", page, url);
        let Some(html) = self.fetch_guarded(&url, RenderMode::Browser).await? else {
            return Ok(None);
        };

        if let Err(e) = snapshots::write_html(&path, &html).await {
            warn!("Could not save search page {}: {:#}", page, e);
        }
        Ok(Some(html))
    }

    async fn probe_count(&self) -> Option<u64> {
        match self.probe.total_listings(&self.cfg.search).await {
            Ok(total) => {
                info!("Count endpoint reports {} listings", total);
                Some(total)
            }
            Err(e) => {
                debug!("Count probe failed, using page signals: {:#}", e);
                None
            }
        }
    }

    async fn fetch_listing(&self, id: &str, url: &str) -> ListingOutcome {
        sleep(self.cfg.request_delay).await;

        match self.fetch_guarded(url, RenderMode::Raw).await {
            Ok(Some(html)) => {
                let path = snapshots::listing_path(&self.cfg.listings_dir, id);
                match snapshots::write_html(&path, &html).await {
                    Ok(()) => {
                        debug!("Saved listing {} to {}", id, path.display());
                        ListingOutcome::Saved
                    }
                    Err(e) => {
                        warn!("Could not save listing {}: {:#}", id, e);
                        ListingOutcome::Failed(url.to_string())
                    }
                }
            }
            Ok(None) => ListingOutcome::Failed(url.to_string()),
            Err(CrawlError::Blocked { url }) => ListingOutcome::Blocked(url),
            Err(e) => {
                warn!("Listing {} failed: {:#}", id, e);
                ListingOutcome::Failed(url.to_string())
            }
        }
    }

    /// Discover listings across all search pages and download the new ones.
    /// Files written before a fatal block stay on disk.
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let cfg = self.cfg;
        tokio::fs::create_dir_all(&cfg.listings_dir)
            .await
            .with_context(|| format!("Failed to create {}", cfg.listings_dir.display()))?;
        tokio::fs::create_dir_all(&cfg.pages_dir)
            .await
            .with_context(|| format!("Failed to create {}", cfg.pages_dir.display()))?;

        info!("Crawling {} on {}", cfg.search, self.fetcher.source_name());
        let saved = snapshots::existing_search_pages(&cfg.pages_dir).await?;
        if !saved.is_empty() {
            info!("Found {} saved search pages", saved.len());
        }

        let mut first_page = self.search_page(1).await?;
        let probe = self.probe_count().await;
        let estimate = self
            .resolver
            .resolve(first_page.as_deref(), probe)
            .with_override(cfg.max_pages);

        match estimate.total_listings {
            Some(total) => info!("{} listings over {} pages", total, estimate.total_pages),
            None => info!("Crawling {} pages", estimate.total_pages),
        }

        let mut summary = CrawlSummary {
            total_pages: estimate.total_pages,
            failed_log: cfg.failed_log(),
            ..Default::default()
        };

        let mut frontier = CrawlFrontier::default();
        for page in 1..=estimate.total_pages {
            let html = if page == 1 {
                first_page.take()
            } else {
                self.search_page(page).await?
            };
            summary.pages_processed = page;

            let Some(html) = html else {
                warn!("Skipping search page {}", page);
                continue;
            };

            let page_url = cfg.search.search_url(&cfg.domain, page);
            let links = self.matcher.extract_listing_links(&html, &page_url)?;
            if links.is_empty() {
                info!("No listings on page {}, stopping pagination", page);
                break;
            }

            let added = frontier.extend(links);
            info!("Page {}/{}: {} new links ({} total)", page, estimate.total_pages, added, frontier.len());
        }
        summary.discovered = frontier.len();

        let existing = snapshots::existing_listing_ids(&cfg.listings_dir).await?;
        let by_id = frontier.by_id();
        let split = partition(by_id.keys(), &existing);
        summary.skipped = split.skipped.len();
        info!(
            "{} listings to fetch, {} already downloaded",
            split.new.len(),
            split.skipped.len()
        );

        let targets: Vec<(&String, &String)> = split
            .new
            .iter()
            .filter_map(|id| by_id.get_key_value(id))
            .collect();
        let batch_count = targets.len().div_ceil(cfg.batch_size.max(1));

        for (index, batch) in targets.chunks(cfg.batch_size.max(1)).enumerate() {
            if index > 0 {
                sleep(cfg.batch_delay).await;
            }

            let outcomes = join_all(batch.iter().map(|(id, url)| self.fetch_listing(id, url))).await;

            let mut failed_urls = Vec::new();
            let mut blocked = None;
            for outcome in outcomes {
                match outcome {
                    ListingOutcome::Saved => summary.fetched += 1,
                    ListingOutcome::Failed(url) => failed_urls.push(url),
                    ListingOutcome::Blocked(url) => {
                        failed_urls.push(url.clone());
                        blocked.get_or_insert(url);
                    }
                }
            }
            summary.failed += failed_urls.len();
            if let Err(e) = snapshots::append_failed_urls(&summary.failed_log, &failed_urls).await {
                warn!("Could not record failed URLs: {:#}", e);
            }

            info!(
                "Batch {}/{}: {} fetched, {} failed so far",
                index + 1,
                batch_count,
                summary.fetched,
                summary.failed
            );

            if let Some(url) = blocked {
                return Err(CrawlError::Blocked { url });
            }
        }

        info!(
            "Crawl finished: {} fetched, {} skipped, {} failed",
            summary.fetched, summary.skipped, summary.failed
        );
        if summary.failed > 0 {
            info!("Failed URLs logged to {}", summary.failed_log.display());
        }
        Ok(summary)
    }
}
