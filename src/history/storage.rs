//! Persistent storage for generation history.
//!
//! Records are kept as one JSON document each, with image payloads in
//! separate binary files. Every mutation follows the same commit protocol:
//!
//! 1. Write and sync any new blob files.
//! 2. Write the record document to a temporary file, sync it, and rename it
//!    over the live document. The rename is the commit point.
//! 3. Remove blob files the replaced document referenced.
//!
//! A crash before step 2 leaves unreferenced blobs behind; they are swept
//! the next time the store is opened. Readers never observe a half-written
//! record.
//!
//! Operations are serialised through an async reader/writer lock: writes
//! (put, delete, clear) are exclusive, reads (get_all, get, count) share.

use super::error::HistoryError;
use super::models::{GeneratedImage, HistoryRecord, SourceImage};
use super::schema::{
    ensure_collection, new_blob_file_name, pending_migrations, record_file_name, BlobRef,
    StoreManifest, StoredRecord, StoredSource, StoredVariant, BLOBS_DIR, LATEST_SCHEMA_VERSION,
    MANIFEST_FILE, RECORDS_DIR, RECORD_EXTENSION, TEMP_SUFFIX, TRASH_SUFFIX,
};
use crate::config::StudioConfig;
use crate::models::{now_millis, ImageBlob};
use crate::object_url::ObjectUrlRegistry;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Handle to an opened history store.
#[derive(Debug)]
pub struct HistoryStore {
    /// Store directory (`<data_dir>/<name>`).
    root: PathBuf,

    /// Store name.
    name: String,

    /// Schema version the store was opened at.
    version: u32,

    /// Transaction lock: writers are exclusive, readers share.
    txn: RwLock<()>,
}

impl HistoryStore {
    /// Opens (creating or upgrading as needed) the store `name` under
    /// `data_dir` at schema `version`.
    ///
    /// On first use, or when `version` is newer than the stored schema, the
    /// pending migrations run and the manifest is rewritten. Leftovers from
    /// interrupted writes are swept afterwards.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the directory cannot be created or written.
    /// - `SchemaUpgradeFailed` if `version` is 0, older than the stored
    ///   schema, the manifest is unreadable, or a migration step fails.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        name: &str,
        version: u32,
    ) -> Result<Self, HistoryError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(HistoryError::StorageUnavailable(format!(
                "invalid store name '{}'",
                name
            )));
        }
        if version == 0 {
            return Err(HistoryError::SchemaUpgradeFailed(
                "schema version must be at least 1".to_string(),
            ));
        }

        let root = data_dir.as_ref().join(name);
        fs::create_dir_all(&root).await.map_err(|e| {
            HistoryError::StorageUnavailable(format!("cannot create {}: {}", root.display(), e))
        })?;

        let store = Self {
            root,
            name: name.to_string(),
            version,
            txn: RwLock::new(()),
        };

        let manifest = store.read_manifest().await?;
        match manifest {
            Some(manifest) if manifest.version > version => {
                return Err(HistoryError::SchemaUpgradeFailed(format!(
                    "stored schema version {} is newer than requested version {}",
                    manifest.version, version
                )));
            }
            Some(manifest) if manifest.version == version => {
                // A clear interrupted between detaching and recreating the
                // collection leaves it missing.
                ensure_collection(&store.root).await.map_err(|e| {
                    HistoryError::StorageUnavailable(format!(
                        "cannot create record collection: {}",
                        e
                    ))
                })?;
            }
            existing => store.upgrade(existing).await?,
        }

        store.sweep().await;
        debug!(
            "Opened history store '{}' at schema version {}",
            store.name, store.version
        );

        Ok(store)
    }

    /// Opens the store described by `config`.
    pub async fn open_with_config(config: &StudioConfig) -> Result<Self, HistoryError> {
        Self::open(&config.data_dir, &config.store_name, config.schema_version).await
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema version the store was opened at.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Store directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Stores `record`, replacing any record with the same id.
    ///
    /// Display handles are stripped before writing. Returns once the new
    /// record document has been durably committed.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::WriteFailed` if the record id is empty or any
    /// part of the write fails. A failed put leaves the previously stored
    /// record (if any) untouched.
    pub async fn put(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if record.id.is_empty() {
            return Err(HistoryError::WriteFailed(
                "record id must not be empty".to_string(),
            ));
        }

        let record = record.strip_object_urls();
        let _guard = self.txn.write().await;

        let mut written = Vec::new();
        match self.commit_record(&record, &mut written).await {
            Ok(replaced) => {
                self.remove_blobs(&replaced).await;
                debug!(
                    "Stored history record {} ({} variants)",
                    record.id,
                    record.variants.len()
                );
                Ok(())
            }
            Err(err) => {
                self.remove_blobs(&written).await;
                Err(HistoryError::write_failed(
                    format_args!("storing record {}", record.id),
                    err,
                ))
            }
        }
    }

    /// Loads every record, minting a display handle in `registry` for each
    /// variant that has a blob.
    ///
    /// # Returns
    ///
    /// All records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::ReadFailed` if the collection cannot be read.
    /// Individual corrupt documents are logged and skipped.
    pub async fn get_all(
        &self,
        registry: &mut ObjectUrlRegistry,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records = self.get_all_raw().await?;
        for record in &mut records {
            record.attach_object_urls(registry);
        }
        Ok(records)
    }

    /// Loads every record without minting display handles.
    ///
    /// # Returns
    ///
    /// All records, newest first, with every variant `url` empty.
    pub async fn get_all_raw(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let _guard = self.txn.read().await;

        let documents = self
            .read_documents()
            .await
            .map_err(|e| HistoryError::read_failed("listing history records", e))?;

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.id.clone();
            match self.hydrate(document).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => {
                    return Err(HistoryError::read_failed(
                        format_args!("loading record {}", id),
                        err,
                    ))
                }
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Loads a single record and mints display handles for its variants.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NotFound` if no record has this id, or
    /// `HistoryError::ReadFailed` if it cannot be read.
    pub async fn get(
        &self,
        id: &str,
        registry: &mut ObjectUrlRegistry,
    ) -> Result<HistoryRecord, HistoryError> {
        let _guard = self.txn.read().await;

        let document = read_document(&self.record_path(id))
            .await
            .map_err(|e| HistoryError::read_failed(format_args!("loading record {}", id), e))?
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))?;

        let mut record = self
            .hydrate(document)
            .await
            .map_err(|e| HistoryError::read_failed(format_args!("loading record {}", id), e))?
            .ok_or_else(|| {
                HistoryError::ReadFailed(format!("record {} references missing data", id))
            })?;

        record.attach_object_urls(registry);
        Ok(record)
    }

    /// Counts the records [`get_all`](Self::get_all) would return, without
    /// loading any image data.
    ///
    /// Corrupt documents and records whose source image data is missing are
    /// not counted.
    pub async fn count(&self) -> Result<usize, HistoryError> {
        let _guard = self.txn.read().await;
        let documents = self
            .read_documents()
            .await
            .map_err(|e| HistoryError::read_failed("counting history records", e))?;

        let mut count = 0;
        for document in &documents {
            let readable = match &document.source_image {
                StoredSource::Blob(blob_ref) => self
                    .blob_present(blob_ref)
                    .await
                    .map_err(|e| HistoryError::read_failed("counting history records", e))?,
                StoredSource::Reference { .. } => true,
            };
            if readable {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Removes the record with `id`.
    ///
    /// Deleting an id that is not stored succeeds and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::WriteFailed` if the record document cannot be
    /// removed.
    pub async fn delete(&self, id: &str) -> Result<(), HistoryError> {
        let _guard = self.txn.write().await;
        let path = self.record_path(id);

        // Unreadable documents are still removed; their blobs are swept on
        // the next open.
        let previous = read_document(&path).await.ok().flatten();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(HistoryError::write_failed(
                    format_args!("deleting record {}", id),
                    e,
                ))
            }
        }

        if let Some(previous) = previous {
            self.remove_blobs(&previous.blob_files()).await;
        }
        debug!("Deleted history record {}", id);
        Ok(())
    }

    /// Removes every record.
    ///
    /// The record and blob directories are detached in one rename each and
    /// replaced with empty ones before the old contents are deleted.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::WriteFailed` if the collection cannot be
    /// detached or recreated.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        let _guard = self.txn.write().await;

        let mut detached = Vec::with_capacity(2);
        for dir in [RECORDS_DIR, BLOBS_DIR] {
            let live = self.root.join(dir);
            let trash = self
                .root
                .join(format!("{}.{}{}", dir, uuid::Uuid::new_v4(), TRASH_SUFFIX));
            match fs::rename(&live, &trash).await {
                Ok(()) => detached.push(trash),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(HistoryError::write_failed("clearing history", e)),
            }
        }

        ensure_collection(&self.root)
            .await
            .map_err(|e| HistoryError::write_failed("clearing history", e))?;

        for trash in detached {
            if let Err(e) = fs::remove_dir_all(&trash).await {
                warn!(
                    "Failed to remove detached collection {}: {}",
                    trash.display(),
                    e
                );
            }
        }

        info!("Cleared history store '{}'", self.name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Schema management
    // ------------------------------------------------------------------

    async fn read_manifest(&self) -> Result<Option<StoreManifest>, HistoryError> {
        let path = self.root.join(MANIFEST_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HistoryError::StorageUnavailable(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            HistoryError::SchemaUpgradeFailed(format!("corrupt store manifest: {}", e))
        })
    }

    async fn upgrade(&self, existing: Option<StoreManifest>) -> Result<(), HistoryError> {
        let from = existing.as_ref().map(|m| m.version).unwrap_or(0);

        for migration in pending_migrations(from, self.version) {
            info!(
                "Upgrading history store '{}' to version {}: {}",
                self.name,
                migration.version,
                migration.step.description()
            );
            migration.step.apply(&self.root).await.map_err(|e| {
                if e.kind() == ErrorKind::PermissionDenied {
                    HistoryError::StorageUnavailable(e.to_string())
                } else {
                    HistoryError::SchemaUpgradeFailed(format!(
                        "migration to version {} failed: {}",
                        migration.version, e
                    ))
                }
            })?;
        }

        if self.version > LATEST_SCHEMA_VERSION {
            debug!(
                "Schema version {} has no structural changes beyond version {}",
                self.version, LATEST_SCHEMA_VERSION
            );
        }

        let now = now_millis();
        let manifest = StoreManifest {
            name: self.name.clone(),
            version: self.version,
            created_at: existing.as_ref().map(|m| m.created_at).unwrap_or(now),
            upgraded_at: now,
        };
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| HistoryError::SchemaUpgradeFailed(e.to_string()))?;

        write_atomic(&self.root.join(MANIFEST_FILE), &bytes)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::PermissionDenied {
                    HistoryError::StorageUnavailable(format!("store is not writable: {}", e))
                } else {
                    HistoryError::SchemaUpgradeFailed(format!("cannot write manifest: {}", e))
                }
            })
    }

    /// Removes leftovers from interrupted writes: temporary files, detached
    /// collections and blobs no record references.
    ///
    /// Failures are logged; a dirty store is still usable.
    async fn sweep(&self) {
        let mut removed = 0usize;

        if let Ok(entries) = list_dir(&self.root).await {
            for path in entries {
                if has_suffix(&path, TRASH_SUFFIX) {
                    if fs::remove_dir_all(&path).await.is_ok() {
                        removed += 1;
                    }
                } else if has_suffix(&path, TEMP_SUFFIX) && fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }

        let record_dir = self.root.join(RECORDS_DIR);
        let mut referenced = HashSet::new();
        let mut all_documents_readable = true;

        match list_dir(&record_dir).await {
            Ok(entries) => {
                for path in entries {
                    if has_suffix(&path, TEMP_SUFFIX) {
                        if fs::remove_file(&path).await.is_ok() {
                            removed += 1;
                        }
                        continue;
                    }
                    if !is_record_document(&path) {
                        continue;
                    }
                    match read_document(&path).await {
                        Ok(Some(document)) => referenced.extend(document.blob_files()),
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Unreadable history record {}: {}", path.display(), e);
                            all_documents_readable = false;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Skipping history sweep: {}", e);
                return;
            }
        }

        // Blobs of an unreadable document cannot be told apart from garbage.
        if all_documents_readable {
            if let Ok(entries) = list_dir(&self.root.join(BLOBS_DIR)).await {
                for path in entries {
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if !referenced.contains(&file_name) && fs::remove_file(&path).await.is_ok() {
                        removed += 1;
                    }
                }
            }
        }

        if removed > 0 {
            info!(
                "Removed {} leftover file(s) from history store '{}'",
                removed, self.name
            );
        }
    }

    // ------------------------------------------------------------------
    // Record documents and blobs
    // ------------------------------------------------------------------

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(RECORDS_DIR).join(record_file_name(id))
    }

    fn blob_path(&self, file: &str) -> PathBuf {
        self.root.join(BLOBS_DIR).join(file)
    }

    /// Writes blobs and the record document. Blob files created along the
    /// way are appended to `written` so a failed commit can remove them.
    ///
    /// # Returns
    ///
    /// Blob files referenced by the document this one replaced.
    async fn commit_record(
        &self,
        record: &HistoryRecord,
        written: &mut Vec<String>,
    ) -> io::Result<Vec<String>> {
        let source_image = match &record.source_image {
            SourceImage::Blob(blob) => StoredSource::Blob(self.write_blob(blob, written).await?),
            SourceImage::Reference(value) => StoredSource::Reference {
                value: value.clone(),
            },
        };

        let mut variants = Vec::with_capacity(record.variants.len());
        for variant in &record.variants {
            let blob = match &variant.blob {
                Some(blob) => Some(self.write_blob(blob, written).await?),
                None => None,
            };
            variants.push(StoredVariant {
                id: variant.id.clone(),
                url: String::new(),
                blob,
                timestamp: variant.timestamp,
            });
        }

        let document = StoredRecord {
            id: record.id.clone(),
            timestamp: record.timestamp,
            metadata: record.metadata.clone(),
            source_image,
            variants,
            settings: record.settings.clone(),
            thumbnail: record.thumbnail.clone(),
        };

        let path = self.record_path(&record.id);
        let replaced = read_document(&path)
            .await
            .ok()
            .flatten()
            .map(|previous| previous.blob_files())
            .unwrap_or_default();

        // New blob names must be durable before a document refers to them
        if !written.is_empty() {
            sync_dir(&self.root.join(BLOBS_DIR)).await?;
        }

        let bytes = serde_json::to_vec_pretty(&document)?;
        write_atomic(&path, &bytes).await?;

        Ok(replaced)
    }

    async fn write_blob(&self, blob: &ImageBlob, written: &mut Vec<String>) -> io::Result<BlobRef> {
        let file = new_blob_file_name();
        write_synced(&self.blob_path(&file), blob.as_bytes()).await?;
        written.push(file.clone());

        Ok(BlobRef {
            file,
            mime_type: blob.mime_type.clone(),
            size: blob.len() as u64,
        })
    }

    async fn read_blob(&self, blob: &BlobRef) -> io::Result<Option<ImageBlob>> {
        let bytes = match fs::read(self.blob_path(&blob.file)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        if bytes.len() as u64 != blob.size {
            warn!(
                "Blob {} has {} bytes, expected {}",
                blob.file,
                bytes.len(),
                blob.size
            );
            return Ok(None);
        }

        Ok(Some(ImageBlob::new(bytes, blob.mime_type.clone())))
    }

    /// Checks that a blob file exists with the recorded size, the same test
    /// [`read_blob`](Self::read_blob) applies.
    async fn blob_present(&self, blob: &BlobRef) -> io::Result<bool> {
        match fs::metadata(self.blob_path(&blob.file)).await {
            Ok(metadata) => Ok(metadata.len() == blob.size),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn remove_blobs(&self, files: &[String]) {
        for file in files {
            match fs::remove_file(self.blob_path(file)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove blob {}: {}", file, e),
            }
        }
    }

    async fn record_paths(&self) -> io::Result<Vec<PathBuf>> {
        let entries = list_dir(&self.root.join(RECORDS_DIR)).await?;
        Ok(entries.into_iter().filter(|p| is_record_document(p)).collect())
    }

    /// Reads every record document, skipping corrupt ones.
    async fn read_documents(&self) -> io::Result<Vec<StoredRecord>> {
        let paths = self.record_paths().await?;
        let mut documents = Vec::with_capacity(paths.len());
        let mut corrupted = 0;

        for path in paths {
            match read_document(&path).await {
                Ok(Some(document)) => documents.push(document),
                // Removed between listing and reading
                Ok(None) => {}
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    corrupted += 1;
                    warn!(
                        "Skipping corrupted history record {}: {}",
                        path.display(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if corrupted > documents.len() {
            warn!(
                "History store has significant corruption ({} corrupted records, {} valid)",
                corrupted,
                documents.len()
            );
        }

        Ok(documents)
    }

    /// Turns a record document back into a record by loading its blobs.
    ///
    /// # Returns
    ///
    /// `None` when the source image blob is missing, which makes the record
    /// unusable. Missing variant blobs only blank out that variant.
    async fn hydrate(&self, document: StoredRecord) -> io::Result<Option<HistoryRecord>> {
        let source_image = match &document.source_image {
            StoredSource::Blob(blob_ref) => match self.read_blob(blob_ref).await? {
                Some(blob) => SourceImage::Blob(blob),
                None => {
                    warn!(
                        "Skipping history record {}: source image data is missing",
                        document.id
                    );
                    return Ok(None);
                }
            },
            StoredSource::Reference { value } => SourceImage::Reference(value.clone()),
        };

        let mut variants = Vec::with_capacity(document.variants.len());
        for variant in document.variants {
            let blob = match &variant.blob {
                Some(blob_ref) => {
                    let blob = self.read_blob(blob_ref).await?;
                    if blob.is_none() {
                        warn!(
                            "Variant {} of record {} has no image data",
                            variant.id, document.id
                        );
                    }
                    blob
                }
                None => None,
            };
            variants.push(GeneratedImage {
                id: variant.id,
                url: String::new(),
                blob,
                timestamp: variant.timestamp,
            });
        }

        Ok(Some(HistoryRecord {
            id: document.id,
            timestamp: document.timestamp,
            metadata: document.metadata,
            source_image,
            variants,
            settings: document.settings,
            thumbnail: document.thumbnail,
        }))
    }
}

/// Sorts records by timestamp, newest first. Ties are broken by id so the
/// order does not depend on directory iteration order.
pub(crate) fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
}

fn is_record_document(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(suffix))
        .unwrap_or(false)
}

async fn list_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    Ok(paths)
}

/// Reads and parses a record document.
///
/// # Returns
///
/// `Ok(None)` if the document does not exist. Parse failures are reported
/// as `ErrorKind::InvalidData`.
async fn read_document(path: &Path) -> io::Result<Option<StoredRecord>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let document = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
    Ok(Some(document))
}

/// Writes `contents` to a new file and syncs it to disk.
async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}

/// Flushes a directory's entries (creations, renames) to disk.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

/// Directory handles cannot be synced on this platform; renames there are
/// only as durable as the file system makes them.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Replaces `path` with `contents` atomically (write temp, sync, rename,
/// sync the parent directory).
async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(format!(".{}{}", uuid::Uuid::new_v4(), TEMP_SUFFIX));
    let temp_path = path.with_file_name(temp_name);

    let result = async {
        write_synced(&temp_path, contents).await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
        return result;
    }

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => sync_dir(parent).await,
        _ => Ok(()),
    }
}
