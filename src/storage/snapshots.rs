use crate::parser::extract_id;
use crate::scrapers::RenderMode;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

static LISTING_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.html$").expect("valid listing file regex"));
static SEARCH_PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^search_page_(\d+)_([a-z]+)\.html$").expect("valid search page file regex"));

pub fn listing_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.html", id))
}

pub fn search_page_path(dir: &Path, page: u32, mode: RenderMode) -> PathBuf {
    dir.join(format!("search_page_{}_{}.html", page, mode.file_tag()))
}

/// IDs of listing files already downloaded. A missing directory is empty.
pub async fn existing_listing_ids(dir: &Path) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    for name in file_names(dir).await? {
        if let Some(caps) = LISTING_FILE.captures(&name) {
            ids.insert(caps[1].to_string());
        }
    }
    Ok(ids)
}

/// Saved search pages by page number, as `(mode tag, path)`
pub async fn existing_search_pages(dir: &Path) -> Result<BTreeMap<u32, (String, PathBuf)>> {
    let mut pages = BTreeMap::new();
    for name in file_names(dir).await? {
        let Some(caps) = SEARCH_PAGE_FILE.captures(&name) else {
            continue;
        };
        let Ok(page) = caps[1].parse::<u32>() else {
            continue;
        };
        pages.insert(page, (caps[2].to_string(), dir.join(&name)));
    }
    Ok(pages)
}

/// Listing HTML files in `dir`, sorted by name
pub async fn listing_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = file_names(dir)
        .await?
        .into_iter()
        .filter(|name| name.ends_with(".html") && extract_id(name).is_some())
        .map(|name| dir.join(name))
        .collect();
    files.sort();
    Ok(files)
}

/// Read a saved snapshot; `None` when it is missing or blank and must be fetched again
pub async fn read_snapshot(path: &Path) -> Option<String> {
    let html = fs::read_to_string(path).await.ok()?;
    if html.trim().is_empty() {
        None
    } else {
        Some(html)
    }
}

pub async fn write_html(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, html)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Append URLs to the newline-delimited failure log
pub async fn append_failed_urls(log: &Path, urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        return Ok(());
    }
    if let Some(parent) = log.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .await
        .with_context(|| format!("Failed to open {}", log.display()))?;
    let mut lines = urls.join("\n");
    lines.push('\n');
    file.write_all(lines.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

async fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_listing_ids_and_search_pages() {
        let dir = tempfile::tempdir().unwrap();
        write_html(&dir.path().join("123.html"), "<html></html>").await.unwrap();
        write_html(&dir.path().join("456.html"), "<html></html>").await.unwrap();
        write_html(&dir.path().join("notes.html"), "x").await.unwrap();
        write_html(&search_page_path(dir.path(), 2, RenderMode::Browser), "<p>")
            .await
            .unwrap();

        let ids = existing_listing_ids(dir.path()).await.unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["123", "456"]);

        let pages = existing_search_pages(dir.path()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[&2].0, "playwright");
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("nope");
        assert!(existing_listing_ids(&absent).await.unwrap().is_empty());
        assert!(listing_files(&absent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_snapshot_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = search_page_path(dir.path(), 1, RenderMode::Raw);
        write_html(&path, "  \n").await.unwrap();
        assert!(read_snapshot(&path).await.is_none());
        write_html(&path, "<html>ok</html>").await.unwrap();
        assert_eq!(read_snapshot(&path).await.as_deref(), Some("<html>ok</html>"));
    }

    #[tokio::test]
    async fn failed_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("failed").join("failed_urls.txt");
        append_failed_urls(&log, &["https://a/1.html".into()]).await.unwrap();
        append_failed_urls(&log, &[]).await.unwrap();
        append_failed_urls(&log, &["https://a/2.html".into()]).await.unwrap();
        let content = std::fs::read_to_string(&log).unwrap();
        assert_eq!(content, "https://a/1.html\nhttps://a/2.html\n");
    }
}
