use crate::scrapers::types::{SearchParams, SortOrder};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BLOCK_PHRASES: &[&str] = &[
    "Sorry, you have been blocked",
    "You are unable to access",
    "data-translate=\"block_headline\"",
    "data-translate=\"unable_to_access\"",
];

/// Run configuration, built once in `main` and passed down by reference
#[derive(Debug, Clone)]
pub struct Config {
    pub domain: String,
    pub count_endpoint: String,
    pub search: SearchParams,
    /// User supplied page count; `None` means auto-detect
    pub max_pages: Option<u32>,
    pub listings_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub output_csv: PathBuf,
    pub batch_size: usize,
    pub request_delay: Duration,
    pub page_delay: Duration,
    pub batch_delay: Duration,
    pub block_cooldown: Duration,
    /// Time a rendered page is given to run its scripts
    pub render_settle: Duration,
    pub block_phrases: Vec<String>,
    pub user_agent: String,
    pub page_size: u32,
    pub default_pages: u32,
    pub country: String,
    /// Prepended to WhatsApp numbers that lack it
    pub phone_country_code: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: "https://www.101evler.com".to_string(),
            count_endpoint: "https://www.101evler.com/ac/arama-sonucu".to_string(),
            search: SearchParams::default(),
            max_pages: None,
            listings_dir: PathBuf::from("listings"),
            pages_dir: PathBuf::from("pages"),
            output_csv: PathBuf::from("property_details.csv"),
            batch_size: 3,
            request_delay: Duration::from_millis(1500),
            page_delay: Duration::from_secs(4),
            batch_delay: Duration::from_secs(8),
            block_cooldown: Duration::from_secs(60),
            render_settle: Duration::from_secs(5),
            block_phrases: DEFAULT_BLOCK_PHRASES.iter().map(|s| s.to_string()).collect(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            page_size: 30,
            default_pages: 30,
            country: "Northern Cyprus".to_string(),
            phone_country_code: "90".to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by `SCOUT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = var("SCOUT_DOMAIN") {
            cfg.domain = v;
        }
        if let Some(v) = var("SCOUT_COUNT_ENDPOINT") {
            cfg.count_endpoint = v;
        }
        if let Some(v) = var("SCOUT_LISTINGS_DIR") {
            cfg.listings_dir = PathBuf::from(v);
        }
        if let Some(v) = var("SCOUT_PAGES_DIR") {
            cfg.pages_dir = PathBuf::from(v);
        }
        if let Some(v) = var("SCOUT_OUTPUT_CSV") {
            cfg.output_csv = PathBuf::from(v);
        }
        if let Some(v) = var("SCOUT_USER_AGENT") {
            cfg.user_agent = v;
        }
        if let Some(v) = parsed::<usize>("SCOUT_BATCH_SIZE")? {
            cfg.batch_size = v.max(1);
        }
        if let Some(v) = parsed::<u64>("SCOUT_REQUEST_DELAY_MS")? {
            cfg.request_delay = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u64>("SCOUT_PAGE_DELAY_MS")? {
            cfg.page_delay = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u64>("SCOUT_BATCH_DELAY_MS")? {
            cfg.batch_delay = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u64>("SCOUT_BLOCK_COOLDOWN_SECS")? {
            cfg.block_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = parsed::<u64>("SCOUT_RENDER_SETTLE_MS")? {
            cfg.render_settle = Duration::from_millis(v);
        }
        if let Some(v) = parsed::<u32>("SCOUT_DEFAULT_PAGES")? {
            cfg.default_pages = v.max(1);
        }
        if let Some(v) = parsed::<u32>("SCOUT_MAX_PAGES")? {
            cfg.max_pages = Some(v.max(1));
        }

        let city = var("SCOUT_CITY");
        let property_type = var("SCOUT_PROPERTY_TYPE");
        let sort = var("SCOUT_SORT");
        cfg.override_search(None, city.as_deref(), property_type.as_deref(), sort.as_deref())?;

        Ok(cfg)
    }

    /// Replace the search with a preset, then apply individual fields on top
    pub fn override_search(
        &mut self,
        preset: Option<&str>,
        city: Option<&str>,
        property_type: Option<&str>,
        sort: Option<&str>,
    ) -> Result<()> {
        let sort = match sort {
            Some(raw) => SortOrder::parse(raw)?,
            None => self.search.sort,
        };
        let base = match preset {
            Some(name) => SearchParams::from_preset(name, sort)?,
            None => self.search.clone(),
        };
        self.search = SearchParams::new(
            city.unwrap_or(&base.city),
            property_type.unwrap_or(&base.property_type),
            sort,
        )?;
        Ok(())
    }

    /// Append-only log of listing URLs that could not be fetched
    pub fn failed_log(&self) -> PathBuf {
        self.listings_dir.join("failed").join("failed_urls.txt")
    }

    /// Host the crawl is restricted to
    pub fn domain_host(&self) -> Result<String> {
        let url = url::Url::parse(&self.domain)
            .with_context(|| format!("Invalid domain {}", self.domain))?;
        url.host_str()
            .map(str::to_string)
            .with_context(|| format!("Domain {} has no host", self.domain))
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(v) => {
            let value = v.trim().parse::<T>().with_context(|| format!("Invalid value for {}: {}", key, v))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site() {
        let cfg = Config::default();
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.page_size, 30);
        assert_eq!(cfg.default_pages, 30);
        assert_eq!(cfg.domain_host().unwrap(), "www.101evler.com");
        assert!(cfg.failed_log().ends_with("failed/failed_urls.txt"));
    }

    #[test]
    fn flags_win_over_preset() {
        let mut cfg = Config::default();
        cfg.override_search(Some("girne_villa"), None, Some("kiralik-villa"), Some("pd"))
            .unwrap();
        assert_eq!(cfg.search.city, "girne");
        assert_eq!(cfg.search.property_type, "kiralik-villa");
        assert_eq!(cfg.search.sort, SortOrder::PriceDescending);

        cfg.override_search(None, Some("lefkosa"), None, None).unwrap();
        assert_eq!(cfg.search.property_type, "kiralik-villa");
        assert_eq!(cfg.search.sort, SortOrder::PriceDescending);
    }

    #[test]
    fn rejects_unknown_search_values() {
        let mut cfg = Config::default();
        assert!(cfg.override_search(Some("paris_loft"), None, None, None).is_err());
        assert!(cfg.override_search(None, None, Some("satilik-castle"), None).is_err());
        assert!(cfg.override_search(None, None, None, Some("zz")).is_err());
        assert_eq!(cfg.search, SearchParams::default());
    }
}
