//! Crawler and field extractor for property listings on 101evler.com.
//!
//! `crawl` walks the search result pages of one search, downloads every
//! listing page not already on disk, and `extract` turns the downloaded
//! pages into rows of a CSV file.

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod scrapers;
pub mod storage;

pub use config::Config;
pub use error::{CrawlError, FetchError};
pub use models::ListingRecord;
