use crate::scrapers::types::{SaleFlag, SearchParams};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

static LISTING_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[-/])(\d+)\.html$").expect("valid listing id regex"));
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Recognizes listing URLs of the target site
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    listing_path: Regex,
    host: String,
}

impl PatternMatcher {
    /// Matcher for both sale and rent listings on `host`
    pub fn new(host: &str) -> Self {
        Self::with_segment(host, "(?:kiralik|satilik)")
    }

    /// Matcher restricted to the sale/rent segment of the searched property type
    pub fn for_search(host: &str, search: &SearchParams) -> Result<Self> {
        let segment = match search.codes()?.sale {
            SaleFlag::Sale => "satilik",
            SaleFlag::Rent => "kiralik",
        };
        Ok(Self::with_segment(host, segment))
    }

    fn with_segment(host: &str, segment: &str) -> Self {
        let pattern = format!(r"/kibris/{}-emlak/[\w-]+(?:/.*)?-\d+\.html", segment);
        Self {
            listing_path: Regex::new(&pattern).expect("valid listing path regex"),
            host: host.to_string(),
        }
    }

    pub fn is_listing_url(&self, href: &str) -> bool {
        self.listing_path.is_match(href)
    }

    /// Absolute same-origin listing URLs found in a search results page
    pub fn extract_listing_links(&self, html: &str, page_url: &str) -> Result<BTreeSet<String>> {
        let mut base = Url::parse(page_url).with_context(|| format!("Invalid page URL {}", page_url))?;
        base.set_query(None);
        base.set_fragment(None);

        let document = Html::parse_document(html);
        let mut links = BTreeSet::new();
        let mut candidates = 0usize;

        for anchor in document.select(&ANCHORS) {
            let href = match anchor.value().attr("href") {
                Some(href) => href.trim(),
                None => continue,
            };
            if !self.is_listing_url(href) {
                continue;
            }
            candidates += 1;

            let Ok(mut absolute) = base.join(href) else {
                continue;
            };
            absolute.set_query(None);
            absolute.set_fragment(None);
            let same_origin = matches!(absolute.scheme(), "http" | "https")
                && absolute.host_str() == Some(self.host.as_str());
            if same_origin {
                links.insert(absolute.to_string());
            } else {
                debug!("Discarding cross-origin listing link {}", absolute);
            }
        }

        debug!("{} listing anchors, {} unique same-origin links", candidates, links.len());
        Ok(links)
    }
}

/// Trailing numeric listing ID of a URL or a saved filename
pub fn extract_id(url_or_filename: &str) -> Option<String> {
    let path = url_or_filename.split(['?', '#']).next().unwrap_or_default();
    LISTING_ID.captures(path).map(|caps| caps[1].to_string())
}
