pub mod csv_store;
pub mod snapshots;

pub use csv_store::{CsvStore, Migration, COLUMNS, DEPRECATED_COLUMNS};
