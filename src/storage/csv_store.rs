//! Tabular record store: one CSV file, append-only, with column migration.

use crate::models::ListingRecord;
use crate::parser::{extract_id, normalize_id};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const COLUMNS: &[&str] = &[
    "source_file",
    "property_id",
    "title",
    "price",
    "currency",
    "listing_type",
    "property_type",
    "property_subtype",
    "room_count",
    "district",
    "city",
    "country",
    "agency_name",
    "url",
    "description",
    "listing_date",
    "update_date",
    "title_deed_type",
    "min_rental_period",
    "payment_interval",
    "exchange_option",
    "price_tl_14x",
    "image_links",
    "phone_numbers",
    "whatsapp_numbers",
];

pub const DEPRECATED_COLUMNS: &[&str] = &[
    "area_m2",
    "floor",
    "furnished",
    "has_elevator",
    "image_count",
    "pros_cons",
    "agent_id",
    "user_id",
    "pros",
    "cons",
    "error",
];

/// What `migrate` did to an existing file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migration {
    pub created: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct IdColumns {
    property_id: Option<String>,
    source_file: Option<String>,
}

pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with the full schema, or bring an existing file's
    /// columns up to date. Rewrites only when something changed and keeps
    /// a `.bak` copy of the previous file.
    pub fn migrate(&self) -> Result<Migration> {
        if !self.path.exists() || fs::metadata(&self.path)?.len() == 0 {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut writer = csv::Writer::from_path(&self.path)
                .with_context(|| format!("Failed to create {}", self.path.display()))?;
            writer.write_record(COLUMNS)?;
            writer.flush()?;
            info!("Created new CSV file: {}", self.path.display());
            return Ok(Migration {
                created: true,
                ..Default::default()
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let removed: Vec<String> = headers
            .iter()
            .filter(|h| DEPRECATED_COLUMNS.contains(&h.as_str()))
            .cloned()
            .collect();
        let added: Vec<String> = COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .map(|c| c.to_string())
            .collect();

        if removed.is_empty() && added.is_empty() {
            return Ok(Migration::default());
        }

        let keep: Vec<usize> = (0..headers.len())
            .filter(|i| !DEPRECATED_COLUMNS.contains(&headers[*i].as_str()))
            .collect();
        let mut new_headers: Vec<String> = keep.iter().map(|i| headers[*i].clone()).collect();
        new_headers.extend(added.iter().cloned());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = keep.iter().map(|i| record.get(*i).unwrap_or_default().to_string()).collect();
            row.extend(added.iter().map(|_| String::new()));
            rows.push(row);
        }

        let backup = backup_path(&self.path);
        fs::copy(&self.path, &backup)
            .with_context(|| format!("Failed to back up {} to {}", self.path.display(), backup.display()))?;
        info!("Created backup of original CSV at: {}", backup.display());

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&new_headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        if !removed.is_empty() {
            info!("Removed columns from CSV: {}", removed.join(", "));
        }
        if !added.is_empty() {
            info!("Added new columns to CSV: {}", added.join(", "));
        }

        Ok(Migration {
            created: false,
            added,
            removed,
            backup: Some(backup),
        })
    }

    /// Append one record in the file's own column order
    pub fn append(&self, record: &ListingRecord) -> Result<()> {
        let headers = self.headers()?;
        let headers = if headers.is_empty() {
            COLUMNS.iter().map(|c| c.to_string()).collect()
        } else {
            headers
        };
        let write_header = !self.path.exists() || fs::metadata(&self.path)?.len() == 0;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for appending", self.path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        if write_header {
            writer.write_record(&headers)?;
        }
        let row: Vec<String> = headers.iter().map(|h| record.column(h).unwrap_or_default()).collect();
        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }

    fn headers(&self) -> Result<Vec<String>> {
        if !self.path.exists() || fs::metadata(&self.path)?.len() == 0 {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }

    /// IDs already stored, from the property_id column and from source
    /// filenames. A file that fails the typed read is re-read row by row;
    /// if that fails too the set is empty and listings are processed again.
    pub fn existing_ids(&self) -> BTreeSet<String> {
        if !self.path.exists() {
            return BTreeSet::new();
        }

        let ids = match self.read_ids_typed() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Error loading existing property IDs: {:#}", e);
                match self.read_ids_lenient() {
                    Ok(ids) => ids,
                    Err(inner) => {
                        warn!("Fallback method also failed: {:#}", inner);
                        BTreeSet::new()
                    }
                }
            }
        };

        info!("Loaded {} existing property IDs from CSV", ids.len());
        ids
    }

    fn read_ids_typed(&self) -> Result<BTreeSet<String>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut ids = BTreeSet::new();
        for row in reader.deserialize::<IdColumns>() {
            let row = row?;
            ids.extend(row.property_id.as_deref().and_then(normalize_id));
            ids.extend(row.source_file.as_deref().and_then(id_from_source_file));
        }
        Ok(ids)
    }

    fn read_ids_lenient(&self) -> Result<BTreeSet<String>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let id_column = headers.iter().position(|h| h == "property_id");
        let source_column = headers.iter().position(|h| h == "source_file");
        if id_column.is_none() && source_column.is_none() {
            anyhow::bail!("No property_id or source_file column");
        }

        let mut ids = BTreeSet::new();
        for record in reader.records() {
            let Ok(record) = record else {
                continue;
            };
            ids.extend(id_column.and_then(|i| record.get(i)).and_then(normalize_id));
            ids.extend(source_column.and_then(|i| record.get(i)).and_then(id_from_source_file));
        }
        Ok(ids)
    }
}

fn id_from_source_file(source_file: &str) -> Option<String> {
    if source_file.ends_with(".html") {
        extract_id(source_file)
    } else {
        None
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}
