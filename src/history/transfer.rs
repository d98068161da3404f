//! Export and import of the whole history as one portable JSON document.
//!
//! Binary payloads travel as base64 data URLs, so a document can be
//! diffed, mailed around, and imported into another store without losing a
//! byte. Import validates and decodes the entire document before touching
//! the store: a malformed document performs no writes at all.

use super::error::HistoryError;
use super::models::{GeneratedImage, HistoryRecord, SourceImage};
use super::storage::HistoryStore;
use crate::codec::{decode_data_url, encode_data_url, CodecError};
use crate::models::{now_millis, GenerationSettings, ProductMetadata};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Newest export format version this crate reads and writes.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Top-level export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Format version tag.
    #[serde(default = "default_version")]
    pub version: u32,

    /// When the export was produced (epoch milliseconds).
    #[serde(default)]
    pub exported_at: i64,

    /// One entry per history record.
    pub items: Vec<ExportItem>,
}

fn default_version() -> u32 {
    EXPORT_FORMAT_VERSION
}

/// A history record in text-safe form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    pub id: String,
    pub timestamp: i64,
    pub metadata: ProductMetadata,

    /// Base64 data URL for binary sources; any other string (including a
    /// data URL that is not base64 encoded) is a reference kept verbatim.
    pub source_image: String,

    pub variants: Vec<ExportVariant>,
    pub settings: GenerationSettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// A variant in text-safe form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportVariant {
    pub id: String,

    /// Data URL of the image, or empty if the variant has no image data.
    #[serde(default)]
    pub blob: String,

    pub timestamp: i64,
}

/// What to do when storing one imported record fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportPolicy {
    /// Stop at the first failed write and return the error. Records stored
    /// before the failure stay stored.
    #[default]
    AbortOnFirstFailure,

    /// Keep going and report every failed record in the summary.
    BestEffort,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    /// Number of records stored.
    pub imported: usize,

    /// Records that could not be stored (best-effort imports only).
    pub failed: Vec<ImportFailure>,
}

impl ImportSummary {
    /// Returns true if every record in the document was stored.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A record that could not be stored during a best-effort import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFailure {
    pub id: String,
    pub reason: String,
}

impl From<&HistoryRecord> for ExportItem {
    fn from(record: &HistoryRecord) -> Self {
        let source_image = match &record.source_image {
            SourceImage::Blob(blob) => encode_data_url(blob),
            SourceImage::Reference(value) => value.clone(),
        };

        let variants = record
            .variants
            .iter()
            .map(|variant| ExportVariant {
                id: variant.id.clone(),
                blob: variant
                    .blob
                    .as_ref()
                    .map(encode_data_url)
                    .unwrap_or_default(),
                timestamp: variant.timestamp,
            })
            .collect();

        Self {
            id: record.id.clone(),
            timestamp: record.timestamp,
            metadata: record.metadata.clone(),
            source_image,
            variants,
            settings: record.settings.clone(),
            thumbnail: record.thumbnail.clone(),
        }
    }
}

impl TryFrom<ExportItem> for HistoryRecord {
    type Error = HistoryError;

    fn try_from(item: ExportItem) -> Result<Self, Self::Error> {
        if item.id.is_empty() {
            return Err(HistoryError::InvalidFormat(
                "item is missing an id".to_string(),
            ));
        }

        // Only base64 data URLs carry binary data; any other string is a
        // reference and comes back exactly as it was exported.
        let source_image = match decode_data_url(&item.source_image) {
            Ok(blob) => SourceImage::Blob(blob),
            Err(CodecError::NotDataUrl) | Err(CodecError::NotBase64Encoded) => {
                SourceImage::Reference(item.source_image)
            }
            Err(e) => {
                return Err(HistoryError::InvalidFormat(format!(
                    "item {} sourceImage: {}",
                    item.id, e
                )))
            }
        };

        let mut variants = Vec::with_capacity(item.variants.len());
        for variant in item.variants {
            let blob = if variant.blob.is_empty() {
                None
            } else {
                Some(decode_data_url(&variant.blob).map_err(|e| {
                    HistoryError::InvalidFormat(format!(
                        "item {} variant {}: {}",
                        item.id, variant.id, e
                    ))
                })?)
            };
            variants.push(GeneratedImage {
                id: variant.id,
                url: String::new(),
                blob,
                timestamp: variant.timestamp,
            });
        }

        Ok(HistoryRecord {
            id: item.id,
            timestamp: item.timestamp,
            metadata: item.metadata,
            source_image,
            variants,
            settings: item.settings,
            thumbnail: item.thumbnail,
        })
    }
}

/// Builds an export document from records.
pub fn build_export_document(records: &[HistoryRecord], version: u32) -> ExportDocument {
    ExportDocument {
        version,
        exported_at: now_millis(),
        items: records.iter().map(ExportItem::from).collect(),
    }
}

/// Serializes the whole store to a pretty-printed export document.
///
/// # Arguments
///
/// * `store` - Store to read from
/// * `version` - Format version written into the document
///
/// # Returns
///
/// The export document text, records newest first.
pub async fn export_history(store: &HistoryStore, version: u32) -> Result<String, HistoryError> {
    render_export(store, version).await.map(|(text, _)| text)
}

/// Exports the whole store into a file.
///
/// # Returns
///
/// The number of records exported.
pub async fn export_to_file(
    store: &HistoryStore,
    version: u32,
    path: impl AsRef<Path>,
) -> Result<usize, HistoryError> {
    let path = path.as_ref();
    let (text, count) = render_export(store, version).await?;

    tokio::fs::write(path, text).await.map_err(|e| {
        HistoryError::write_failed(format_args!("writing {}", path.display()), e)
    })?;
    Ok(count)
}

async fn render_export(
    store: &HistoryStore,
    version: u32,
) -> Result<(String, usize), HistoryError> {
    let records = store.get_all_raw().await?;
    let document = build_export_document(&records, version);

    let text = serde_json::to_string_pretty(&document)
        .map_err(|e| HistoryError::write_failed("serializing export document", e))?;
    info!("Exported {} history record(s)", records.len());
    Ok((text, records.len()))
}

/// Parses and fully decodes an export document.
///
/// Nothing is written. Every item is decoded up front so that callers can
/// reject a document before storing any part of it.
///
/// # Errors
///
/// Returns `HistoryError::InvalidFormat` if the text is not JSON, `items`
/// is missing or not an array, the version is newer than
/// [`EXPORT_FORMAT_VERSION`], an item lacks a required field, or an
/// encoded image cannot be decoded.
pub fn parse_export_document(text: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| HistoryError::InvalidFormat(format!("not a JSON document: {}", e)))?;

    match value.get("items") {
        Some(Value::Array(_)) => {}
        Some(_) => {
            return Err(HistoryError::InvalidFormat(
                "`items` must be an array".to_string(),
            ))
        }
        None => {
            return Err(HistoryError::InvalidFormat(
                "missing `items` array".to_string(),
            ))
        }
    }

    let document: ExportDocument = serde_json::from_value(value)
        .map_err(|e| HistoryError::InvalidFormat(e.to_string()))?;

    if document.version > EXPORT_FORMAT_VERSION {
        return Err(HistoryError::InvalidFormat(format!(
            "export format version {} is newer than supported version {}",
            document.version, EXPORT_FORMAT_VERSION
        )));
    }

    document
        .items
        .into_iter()
        .map(HistoryRecord::try_from)
        .collect()
}

/// Restores records from an export document into `store`.
///
/// Records whose id already exists are replaced.
///
/// # Arguments
///
/// * `store` - Destination store
/// * `text` - Export document text
/// * `policy` - How to handle a failed write
///
/// # Errors
///
/// - `InvalidFormat` if the document fails validation (no writes happen).
/// - `WriteFailed` on the first failed write under
///   [`ImportPolicy::AbortOnFirstFailure`].
pub async fn import_history(
    store: &HistoryStore,
    text: &str,
    policy: ImportPolicy,
) -> Result<ImportSummary, HistoryError> {
    let records = parse_export_document(text)?;
    debug!("Importing {} history record(s)", records.len());

    let mut summary = ImportSummary::default();
    for record in &records {
        match store.put(record).await {
            Ok(()) => summary.imported += 1,
            Err(err) => match policy {
                ImportPolicy::AbortOnFirstFailure => {
                    warn!(
                        "Import aborted at record {} after {} stored: {}",
                        record.id, summary.imported, err
                    );
                    return Err(err);
                }
                ImportPolicy::BestEffort => {
                    warn!("Skipping record {} during import: {}", record.id, err);
                    summary.failed.push(ImportFailure {
                        id: record.id.clone(),
                        reason: err.to_string(),
                    });
                }
            },
        }
    }

    info!(
        "Imported {} history record(s), {} failed",
        summary.imported,
        summary.failed.len()
    );
    Ok(summary)
}

/// Imports an export document from a file.
pub async fn import_from_file(
    store: &HistoryStore,
    path: impl AsRef<Path>,
    policy: ImportPolicy,
) -> Result<ImportSummary, HistoryError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        HistoryError::read_failed(format_args!("reading {}", path.display()), e)
    })?;
    import_history(store, &text, policy).await
}
