use clap::{Parser, Subcommand};
use housing_scout::crawler::{Crawler, ExtractPipeline};
use housing_scout::scrapers::types::{PRESETS, PROPERTY_TYPES};
use housing_scout::scrapers::{BrowserRenderer, EvlerClient};
use housing_scout::{Config, CrawlError};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "housing-scout", version, about = "Property listing crawler and extractor for 101evler.com")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the search pages and download new listing pages
    Crawl {
        /// Number of search pages to crawl (default: auto-detect)
        #[arg(short = 'n', long)]
        max_pages: Option<u32>,
        /// Named city + property type, see `presets`
        #[arg(short, long)]
        preset: Option<String>,
        #[arg(long)]
        city: Option<String>,
        /// Property type key, e.g. satilik-villa
        #[arg(long)]
        property_type: Option<String>,
        /// mr (newest), pa (price ascending) or pd (price descending)
        #[arg(long)]
        sort: Option<String>,
        /// Fetch search pages without headless Chrome
        #[arg(long)]
        no_browser: bool,
    },
    /// Extract fields from downloaded listing pages into the CSV file
    Extract {
        /// Keep running and re-extract at an interval
        #[arg(long)]
        continuous: bool,
        /// Minutes between continuous runs
        #[arg(long, default_value_t = 30)]
        interval: u64,
        /// Number of continuous runs
        #[arg(long, default_value_t = 10)]
        max_runs: u32,
    },
    /// List presets and property types
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    let mut cfg = Config::from_env()?;

    match cli.command {
        Commands::Crawl {
            max_pages,
            preset,
            city,
            property_type,
            sort,
            no_browser,
        } => {
            cfg.override_search(preset.as_deref(), city.as_deref(), property_type.as_deref(), sort.as_deref())?;
            if max_pages.is_some() {
                cfg.max_pages = max_pages.map(|pages| pages.max(1));
            }

            let renderer = if no_browser {
                None
            } else {
                match BrowserRenderer::new(cfg.render_settle) {
                    Ok(renderer) => Some(renderer),
                    Err(e) => {
                        warn!("Chrome unavailable, search pages will be fetched raw: {:#}", e);
                        None
                    }
                }
            };
            let client = EvlerClient::new(&cfg, renderer)?;
            let crawler = Crawler::new(&cfg, &client, &client)?;

            match crawler.run().await {
                Ok(summary) => {
                    println!("Search pages crawled: {}/{}", summary.pages_processed, summary.total_pages);
                    println!("Listings discovered:  {}", summary.discovered);
                    println!("Fetched:              {}", summary.fetched);
                    println!("Skipped (on disk):    {}", summary.skipped);
                    println!("Failed:               {}", summary.failed);
                    if summary.failed > 0 {
                        println!("Retry list:           {}", summary.failed_log.display());
                    }
                }
                Err(CrawlError::Blocked { url }) => {
                    error!("Blocked by the site at {}; files saved so far are kept", url);
                    error!("Failed URLs are listed in {}", cfg.failed_log().display());
                    std::process::exit(1);
                }
                Err(CrawlError::Other(e)) => return Err(e),
            }
        }
        Commands::Extract {
            continuous,
            interval,
            max_runs,
        } => {
            let pipeline = ExtractPipeline::new(&cfg);
            if continuous {
                info!(
                    "Running in continuous mode with {} minute intervals, maximum {} runs",
                    interval, max_runs
                );
                pipeline
                    .run_continuous(Duration::from_secs(interval * 60), max_runs.max(1))
                    .await?;
            } else {
                pipeline.run_once().await?;
            }
        }
        Commands::Presets => {
            println!("Presets:");
            for (name, city, property_type) in PRESETS {
                println!("  {:<14} {} / {}", name, city, property_type);
            }
            println!("Property types:");
            for codes in PROPERTY_TYPES {
                println!(
                    "  {:<14} type={} subtypes={:?} s_r={}",
                    codes.key,
                    codes.type_code,
                    codes.subtype_codes,
                    codes.sale.code()
                );
            }
        }
    }

    Ok(())
}
