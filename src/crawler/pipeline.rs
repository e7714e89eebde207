use crate::config::Config;
use crate::parser::{extract_id, partition, Extraction, FieldExtractor};
use crate::storage::{snapshots, CsvStore};
use anyhow::{Context, Result};
use chrono::Local;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Totals of one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub total_files: usize,
    pub processed: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExtractSummary {
    /// Nothing new was found, so the next continuous run need not wait
    pub fn found_nothing(&self) -> bool {
        self.total_files == 0 || (self.processed == 0 && self.skipped == self.total_files)
    }
}

/// Turns downloaded listing pages into CSV rows
pub struct ExtractPipeline<'a> {
    cfg: &'a Config,
    extractor: FieldExtractor,
    store: CsvStore,
}

impl<'a> ExtractPipeline<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            cfg,
            extractor: FieldExtractor::from_config(cfg),
            store: CsvStore::new(&cfg.output_csv),
        }
    }

    pub async fn run_once(&self) -> Result<ExtractSummary> {
        let started = Local::now();
        info!("Starting property extraction at {}", started.format("%Y-%m-%d %H:%M:%S"));

        self.store.migrate()?;
        let files = snapshots::listing_files(&self.cfg.listings_dir).await?;
        let existing = self.store.existing_ids();

        let candidates: BTreeSet<String> = files
            .iter()
            .filter_map(|path| path.file_name()?.to_str().and_then(extract_id))
            .collect();
        let split = partition(&candidates, &existing);

        let mut summary = ExtractSummary {
            total_files: files.len(),
            skipped: split.skipped.len(),
            ..Default::default()
        };

        let new_files: Vec<&Path> = files
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(extract_id)
                    .is_some_and(|id| split.new.contains(&id))
            })
            .map(|path| path.as_path())
            .collect();

        if new_files.is_empty() {
            info!("No new files to process");
            return Ok(summary);
        }
        info!("Processing {} new HTML files...", new_files.len());

        let pb = ProgressBar::new(new_files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
                .progress_chars("#>-"),
        );

        for batch in new_files.chunks(self.cfg.batch_size.max(1)) {
            let extractions = join_all(batch.iter().map(|path| self.extract_file(path))).await;

            for (path, extraction) in batch.iter().zip(extractions) {
                match extraction.and_then(|extraction| self.store_extraction(extraction)) {
                    Ok(partial) => {
                        summary.processed += 1;
                        if partial {
                            summary.partial += 1;
                        }
                    }
                    Err(e) => {
                        pb.suspend(|| warn!("Failed to process {}: {:#}", path.display(), e));
                        summary.failed += 1;
                    }
                }
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        info!("Extraction summary:");
        info!("- Successfully processed: {} files ({} partial)", summary.processed, summary.partial);
        info!("- Failed: {} files", summary.failed);
        info!("- Skipped (already processed): {} files", summary.skipped);
        info!("- Total files: {} files", summary.total_files);
        info!("Extraction completed at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

        Ok(summary)
    }

    /// Read and extract one file off the async workers. Undecodable bytes are
    /// replaced, so only I/O errors fail here.
    async fn extract_file(&self, path: &Path) -> Result<Extraction> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || {
            let html = String::from_utf8_lossy(&bytes);
            extractor.extract(&html, &source_file)
        })
        .await
        .with_context(|| format!("Extraction task for {} panicked", path.display()))
    }

    /// Append the record; `Ok(true)` when it is partial
    fn store_extraction(&self, extraction: Extraction) -> Result<bool> {
        let partial = extraction.is_partial();
        let record = extraction.into_record();
        if record.is_low_confidence() {
            warn!("Only sparse data found in {}", record.source_file);
        }

        self.store.append(&record)?;
        Ok(partial)
    }

    /// Repeat `run_once` up to `max_runs` times, `interval` apart. A run that
    /// found nothing new is followed immediately by the next one.
    pub async fn run_continuous(&self, interval: Duration, max_runs: u32) -> Result<Vec<ExtractSummary>> {
        let mut summaries = Vec::new();

        for run in 1..=max_runs {
            info!("--- Starting extraction run {} of {} ---", run, max_runs);
            let summary = self.run_once().await?;
            summaries.push(summary);

            if run == max_runs {
                info!("Completed {} extraction runs", max_runs);
                break;
            }
            if summary.found_nothing() {
                info!("No new files to process, starting next run without waiting");
                continue;
            }

            info!("Waiting {:?} before next extraction run...", interval);
            tokio::time::sleep(interval).await;
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><head>
        <meta property="og:url" content="https://www.101evler.com/kibris/kiralik-emlak/daire-girne-55.html">
        </head><body><h1>Girne 2+1 Daire</h1></body></html>"#;

    #[tokio::test]
    async fn extracts_new_files_and_skips_stored_ones() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            listings_dir: dir.path().join("listings"),
            output_csv: dir.path().join("out.csv"),
            ..Config::default()
        };
        std::fs::create_dir_all(&cfg.listings_dir).unwrap();
        std::fs::write(cfg.listings_dir.join("55.html"), LISTING).unwrap();
        std::fs::write(cfg.listings_dir.join("56.html"), "<html><body>").unwrap();

        let pipeline = ExtractPipeline::new(&cfg);
        let first = pipeline.run_once().await.unwrap();
        assert_eq!(first.total_files, 2);
        assert_eq!(first.processed, 2);
        assert_eq!(first.skipped, 0);

        let second = pipeline.run_once().await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 2);
        assert!(second.found_nothing());

        let mut reader = csv::Reader::from_path(&cfg.output_csv).unwrap();
        assert_eq!(reader.records().count(), 2);
    }

    #[tokio::test]
    async fn non_utf8_listing_still_yields_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            listings_dir: dir.path().join("listings"),
            output_csv: dir.path().join("out.csv"),
            ..Config::default()
        };
        std::fs::create_dir_all(&cfg.listings_dir).unwrap();
        let mut bytes = b"<html><body><h1>Villa Girne ".to_vec();
        bytes.push(0xE7);
        bytes.extend_from_slice(b"</h1></body></html>");
        std::fs::write(cfg.listings_dir.join("77.html"), bytes).unwrap();

        let pipeline = ExtractPipeline::new(&cfg);
        let first = pipeline.run_once().await.unwrap();
        assert_eq!(first.processed, 1);
        assert_eq!(first.failed, 0);

        let second = pipeline.run_once().await.unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(second.processed, 0);
    }

    #[tokio::test]
    async fn processes_more_files_than_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            listings_dir: dir.path().join("listings"),
            output_csv: dir.path().join("out.csv"),
            batch_size: 2,
            ..Config::default()
        };
        std::fs::create_dir_all(&cfg.listings_dir).unwrap();
        for id in 1..=5 {
            std::fs::write(cfg.listings_dir.join(format!("{}.html", id)), LISTING).unwrap();
        }

        let summary = ExtractPipeline::new(&cfg).run_once().await.unwrap();
        assert_eq!(summary.processed, 5);
        let mut reader = csv::Reader::from_path(&cfg.output_csv).unwrap();
        assert_eq!(reader.records().count(), 5);
    }

    #[tokio::test]
    async fn continuous_mode_stops_after_max_runs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            listings_dir: dir.path().join("listings"),
            output_csv: dir.path().join("out.csv"),
            ..Config::default()
        };

        let pipeline = ExtractPipeline::new(&cfg);
        let runs = pipeline.run_continuous(Duration::from_secs(3600), 3).await.unwrap();
        assert_eq!(runs.len(), 3);
        assert!(runs.iter().all(ExtractSummary::found_nothing));
    }
}
