//! On-disk layout, schema versioning and at-rest record documents.
//!
//! A store lives in `<data_dir>/<store name>/`:
//!
//! ```text
//! manifest.json        schema version and creation instant
//! records/<key>.json   one document per history record
//! blobs/<uuid>.bin     raw image bytes referenced by record documents
//! ```
//!
//! A record document is the commit point for its blobs: blob files that no
//! record document references are garbage left by an interrupted write.

use crate::models::{GenerationSettings, ProductMetadata};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Schema manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Directory holding one JSON document per record.
pub const RECORDS_DIR: &str = "records";

/// Directory holding raw image payloads.
pub const BLOBS_DIR: &str = "blobs";

/// Extension of record documents.
pub const RECORD_EXTENSION: &str = "json";

/// Extension of blob files.
pub const BLOB_EXTENSION: &str = "bin";

/// Suffix of in-flight temporary files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Suffix of collections detached by a clear and awaiting removal.
pub const TRASH_SUFFIX: &str = ".trash";

/// Newest schema version this crate knows how to build.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Persisted description of a store's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreManifest {
    /// Store name (matches the directory name).
    pub name: String,

    /// Current schema version.
    pub version: u32,

    /// When the store was first created (epoch milliseconds).
    pub created_at: i64,

    /// When the schema was last upgraded (epoch milliseconds).
    pub upgraded_at: i64,
}

/// A single schema change, applied when upgrading past `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Version this step upgrades to.
    pub version: u32,

    /// What the step does.
    pub step: MigrationStep,
}

/// Schema changes known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Creates the keyed record collection and the blob directory.
    CreateRecordCollection,
}

impl MigrationStep {
    /// Human-readable description for logs.
    pub fn description(&self) -> &'static str {
        match self {
            MigrationStep::CreateRecordCollection => "create record collection keyed by id",
        }
    }

    /// Applies the step to the store rooted at `root`.
    pub async fn apply(&self, root: &Path) -> std::io::Result<()> {
        match self {
            MigrationStep::CreateRecordCollection => ensure_collection(root).await,
        }
    }
}

/// Ordered list of schema migrations.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    step: MigrationStep::CreateRecordCollection,
}];

/// Returns the migrations needed to go from `from` (exclusive) to `to`
/// (inclusive), in order.
pub fn pending_migrations(from: u32, to: u32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS
        .iter()
        .filter(move |m| m.version > from && m.version <= to)
}

/// Creates the record and blob directories if they are missing.
pub async fn ensure_collection(root: &Path) -> std::io::Result<()> {
    fs::create_dir_all(root.join(RECORDS_DIR)).await?;
    fs::create_dir_all(root.join(BLOBS_DIR)).await?;
    Ok(())
}

/// Longest encoded id used verbatim in a document name. File systems cap
/// names at 255 bytes.
pub const MAX_ENCODED_ID_LEN: usize = 200;

/// Prefix of document names derived from an id digest. `~` is outside the
/// URL-safe base64 alphabet, so digest names never clash with encoded ids.
pub const DIGEST_NAME_PREFIX: &str = "~";

/// Maps a record id onto a file-system safe document name.
///
/// Ids are opaque strings, so they are base64 (URL-safe alphabet) encoded
/// rather than used verbatim. Ids whose encoding would exceed
/// [`MAX_ENCODED_ID_LEN`] are named by a name-based UUID (SHA-1) of the id
/// instead; the full id is always kept inside the document.
pub fn record_file_name(id: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(id.as_bytes());
    if encoded.len() <= MAX_ENCODED_ID_LEN {
        return format!("{}.{}", encoded, RECORD_EXTENSION);
    }

    let digest = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, id.as_bytes());
    format!(
        "{}{}.{}",
        DIGEST_NAME_PREFIX,
        digest.simple(),
        RECORD_EXTENSION
    )
}

/// Generates a new, unique blob file name.
pub fn new_blob_file_name() -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), BLOB_EXTENSION)
}

/// Reference from a record document to a blob file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    /// File name inside the blob directory.
    pub file: String,

    /// MIME type of the payload.
    pub mime_type: String,

    /// Payload length in bytes, checked on read.
    pub size: u64,
}

/// At-rest form of a record's source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoredSource {
    Blob(BlobRef),
    Reference { value: String },
}

/// At-rest form of a generated variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVariant {
    pub id: String,

    /// Always empty at rest.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub blob: Option<BlobRef>,

    pub timestamp: i64,
}

/// At-rest form of a history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: String,
    pub timestamp: i64,
    pub metadata: ProductMetadata,
    pub source_image: StoredSource,
    pub variants: Vec<StoredVariant>,
    pub settings: GenerationSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl StoredRecord {
    /// Every blob file this document references.
    pub fn blob_files(&self) -> Vec<String> {
        let mut files = Vec::with_capacity(self.variants.len() + 1);
        if let StoredSource::Blob(blob) = &self.source_image {
            files.push(blob.file.clone());
        }
        files.extend(
            self.variants
                .iter()
                .filter_map(|v| v.blob.as_ref().map(|b| b.file.clone())),
        );
        files
    }
}
