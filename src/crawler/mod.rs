pub mod crawl;
pub mod frontier;
pub mod pipeline;

pub use crawl::{CrawlSummary, Crawler};
pub use frontier::CrawlFrontier;
pub use pipeline::{ExtractPipeline, ExtractSummary};
