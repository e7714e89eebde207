//! Total page count of a search, inferred from the first results page.
//!
//! Signals are consulted in a fixed order: count probe, embedded page
//! counter, "N results found" text, highest pagination option, "last page"
//! link, listing-card count, configured default. A probe result always wins.

use crate::config::Config;
use crate::models::PageCountEstimate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static PAGE_MARKER: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"#totalPage, input[name="totalPage"], [data-total-pages]"#).expect("valid page marker selector")
});
static PAGINATION_ITEMS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#".pagination a, .pagination option, select[name="page"] option, a.page-link"#)
        .expect("valid pagination selector")
});
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static LISTING_CARDS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".property-card, .ilan-card, [data-listing-id]").expect("valid listing card selector")
});
static RESULTS_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d.,]*)\s*(?:adet\s+)?(?:ilan|sonuç|results?)\s+(?:bulundu|found)")
        .expect("valid results regex")
});
static PAGE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]page=(\d+)").expect("valid page param regex"));

/// What the HTML alone says about the search size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HtmlSignals {
    total_listings: Option<u64>,
    total_pages: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageCountResolver {
    page_size: u32,
    default_pages: u32,
}

impl PageCountResolver {
    pub fn new(page_size: u32, default_pages: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            default_pages: default_pages.max(1),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.page_size, cfg.default_pages)
    }

    /// Pages needed for `listings` results, never less than one
    pub fn pages_for(&self, listings: u64) -> u32 {
        let pages = listings.div_ceil(u64::from(self.page_size)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// `probe` is the count endpoint's answer, `None` when it failed.
    /// A probe answer of zero is a real answer and gives one page.
    /// `first_page_html` is `None` when the first page could not be fetched.
    pub fn resolve(&self, first_page_html: Option<&str>, probe: Option<u64>) -> PageCountEstimate {
        if let Some(total) = probe {
            let estimate = PageCountEstimate {
                total_listings: Some(total),
                total_pages: self.pages_for(total),
            };
            debug!("Page count from probe: {:?}", estimate);
            return estimate;
        }

        let Some(html) = first_page_html else {
            debug!("First page unavailable, using default of {} pages", self.default_pages);
            return PageCountEstimate {
                total_listings: None,
                total_pages: self.default_pages,
            };
        };

        let signals = self.html_signals(html);
        let total_pages = signals.total_pages.unwrap_or_else(|| {
            debug!("No pagination signal, using default of {} pages", self.default_pages);
            self.default_pages
        });
        PageCountEstimate {
            total_listings: signals.total_listings,
            total_pages,
        }
    }

    fn html_signals(&self, html: &str) -> HtmlSignals {
        let document = Html::parse_document(html);
        let mut signals = HtmlSignals::default();

        if let Some(pages) = embedded_page_marker(&document) {
            debug!("Page count from embedded marker: {}", pages);
            signals.total_pages = Some(pages);
        }

        if let Some(total) = results_found(&document) {
            debug!("Results text reports {} listings", total);
            signals.total_listings = Some(total);
            if signals.total_pages.is_none() {
                signals.total_pages = Some(self.pages_for(total));
            }
        }

        if signals.total_pages.is_none() {
            if let Some(pages) = highest_pagination_option(&document) {
                debug!("Page count from pagination control: {}", pages);
                signals.total_pages = Some(pages);
            }
        }

        if signals.total_pages.is_none() {
            if let Some(pages) = last_page_link(&document) {
                debug!("Page count from last-page link: {}", pages);
                signals.total_pages = Some(pages);
            }
        }

        // Card count is a lower bound only; it settles the empty-search case.
        if signals.total_listings.is_none() && signals.total_pages.is_none() {
            let cards = document.select(&LISTING_CARDS).count();
            debug!("{} listing cards on first page", cards);
            if cards == 0 {
                signals.total_pages = Some(1);
            }
        }

        signals
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| !matches!(c, '.' | ',' | ' ' | '\u{a0}')).collect();
    digits.parse().ok()
}

/// Counter element rendered by the site; "1" is its unfilled default
fn embedded_page_marker(document: &Html) -> Option<u32> {
    document.select(&PAGE_MARKER).find_map(|el| {
        let raw = el
            .value()
            .attr("value")
            .or_else(|| el.value().attr("data-total-pages"))
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| text_of(el));
        if raw.is_empty() || raw == "1" {
            return None;
        }
        raw.parse::<u32>().ok().filter(|p| *p > 0)
    })
}

fn results_found(document: &Html) -> Option<u64> {
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    RESULTS_FOUND.captures(&text).and_then(|caps| parse_count(&caps[1]))
}

fn highest_pagination_option(document: &Html) -> Option<u32> {
    document
        .select(&PAGINATION_ITEMS)
        .filter_map(|el| {
            let from_text = text_of(el).parse::<u32>().ok();
            let from_value = el.value().attr("value").and_then(|v| v.trim().parse::<u32>().ok());
            let from_href = el.value().attr("href").and_then(page_param);
            from_text.or(from_value).or(from_href)
        })
        .max()
        .filter(|pages| *pages > 1)
}

fn last_page_link(document: &Html) -> Option<u32> {
    document
        .select(&ANCHORS)
        .filter(|a| {
            let label = text_of(*a).to_lowercase();
            let aria = a.value().attr("aria-label").unwrap_or_default().to_lowercase();
            a.value().attr("rel") == Some("last")
                || matches!(label.as_str(), "son" | "son sayfa" | "last" | "last page" | "»»")
                || aria.contains("last")
                || aria.contains("son sayfa")
        })
        .find_map(|a| a.value().attr("href").and_then(page_param))
        .filter(|pages| *pages > 0)
}

fn page_param(href: &str) -> Option<u32> {
    PAGE_PARAM.captures(href).and_then(|caps| caps[1].parse().ok())
}
