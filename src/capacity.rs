//! Storage usage, quota and durability status of the history location.
//!
//! Durability is recorded as a marker file in the store directory: once a
//! caller has asked for it, maintenance tooling must not evict the store.
//! Usage is the total size of the files under the store directory; the
//! quota comes from configuration, and without one estimation is
//! unsupported.

use crate::config::StudioConfig;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the durability marker file.
pub const DURABILITY_MARKER: &str = ".persisted";

/// Snapshot of storage consumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEstimate {
    /// Bytes in use.
    pub usage: u64,

    /// Bytes available in total.
    pub quota: u64,

    /// `usage / quota * 100`, or 0 when the quota is 0.
    pub percent_used: f64,
}

impl StorageEstimate {
    pub fn new(usage: u64, quota: u64) -> Self {
        let percent_used = if quota == 0 {
            0.0
        } else {
            usage as f64 / quota as f64 * 100.0
        };
        Self {
            usage,
            quota,
            percent_used,
        }
    }
}

/// Reports on, and requests durability for, one store directory.
#[derive(Debug, Clone)]
pub struct CapacityProbe {
    root: PathBuf,
    quota: Option<u64>,
}

impl CapacityProbe {
    /// Creates a probe for `root` with an optional quota in bytes.
    pub fn new(root: impl Into<PathBuf>, quota: Option<u64>) -> Self {
        Self {
            root: root.into(),
            quota,
        }
    }

    /// Creates a probe for the store described by `config`.
    pub fn from_config(config: &StudioConfig) -> Self {
        Self::new(config.store_path(), config.storage_quota_bytes())
    }

    /// Directory this probe reports on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Marks the store as durable.
    ///
    /// # Returns
    ///
    /// `true` if the store is now durable; `false` if the store directory
    /// does not exist or the marker cannot be written.
    pub async fn request_durability(&self) -> bool {
        if !fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            debug!(
                "Cannot request durability: {} is not a directory",
                self.root.display()
            );
            return false;
        }

        let stamp = crate::models::now_millis().to_string();
        match fs::write(self.root.join(DURABILITY_MARKER), stamp).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to mark {} as durable: {}", self.root.display(), e);
                false
            }
        }
    }

    /// Returns whether durability has been granted for the store.
    pub async fn is_durable(&self) -> bool {
        fs::metadata(self.root.join(DURABILITY_MARKER))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Estimates usage against the configured quota.
    ///
    /// # Returns
    ///
    /// `None` when no quota is configured or the store cannot be measured.
    pub async fn estimate(&self) -> Option<StorageEstimate> {
        let quota = self.quota?;
        match directory_size(&self.root).await {
            Ok(usage) => Some(StorageEstimate::new(usage, quota)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Some(StorageEstimate::new(0, quota)),
            Err(e) => {
                warn!("Failed to measure {}: {}", self.root.display(), e);
                None
            }
        }
    }
}

/// Sums file sizes below `root` without following symlinks.
async fn directory_size(root: &Path) -> io::Result<u64> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Removed while walking
            Err(e) if e.kind() == io::ErrorKind::NotFound && dir != root => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            }
        }
    }

    Ok(total)
}
