//! Generation history: persistence, export/import and search.
//!
//! Every generation run produces one [`HistoryRecord`] holding the source
//! photo, the extracted product metadata, the generated variants and the
//! settings used. Records are kept in a [`HistoryStore`] on the local
//! filesystem.
//!
//! # Features
//!
//! - Crash-safe, schema-versioned record storage with atomic replace
//! - Display handles stripped on every write and re-minted on every read
//! - Lossless export/import through a single JSON document
//! - Case-insensitive search and filters over loaded records
//!
//! # Example
//!
//! ```ignore
//! use product_studio::history::{HistoryStore, export_history};
//! use product_studio::object_url::ObjectUrlRegistry;
//!
//! let store = HistoryStore::open(data_dir, "ProductStudioHistory", 1).await?;
//! store.put(&record).await?;
//!
//! let mut registry = ObjectUrlRegistry::new();
//! let records = store.get_all(&mut registry).await?;
//! let document = export_history(&store, 1).await?;
//! ```

pub mod error;
pub mod models;
pub mod schema;
pub mod search;
pub mod storage;
pub mod transfer;
pub mod ui;

// Re-export commonly used types
pub use error::HistoryError;
pub use models::{GeneratedImage, HistoryRecord, SourceImage};
pub use search::{
    filter_by_aspect_ratio, filter_by_mode, filter_since, get_recent_entries, search_history,
    sort_by_timestamp_asc, sort_by_timestamp_desc,
};
pub use storage::HistoryStore;
pub use transfer::{
    build_export_document, export_history, export_to_file, import_from_file, import_history,
    parse_export_document, ExportDocument, ExportItem, ExportVariant, ImportFailure, ImportPolicy,
    ImportSummary, EXPORT_FORMAT_VERSION,
};
pub use ui::{
    format_history_details, format_history_entry, format_history_list, format_history_stats,
};
