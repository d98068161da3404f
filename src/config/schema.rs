//! Configuration schema for the product studio.
//!
//! This module defines the configuration structure and validation logic for
//! every user-configurable setting.

use crate::history::transfer::{ImportPolicy, EXPORT_FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on `maxVariants`.
pub const MAX_VARIANTS_LIMIT: u32 = 8;

/// Main configuration structure.
///
/// All settings can be configured under the "product-studio" key. Missing
/// settings fall back to sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    /// Directory that holds the history store.
    ///
    /// Defaults to `~/.local/share/product-studio`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the history store inside `data_dir`.
    ///
    /// Defaults to "ProductStudioHistory". Must be a single path component.
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Schema version the store is opened at.
    ///
    /// Raising it upgrades an existing store; lowering it below the stored
    /// version makes opening fail. Defaults to 1.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Format version written into export documents. Defaults to 1.
    #[serde(default = "default_export_format_version")]
    pub export_format_version: u32,

    /// How imports treat a record that fails to store.
    ///
    /// Valid values: "abortOnFirstFailure", "bestEffort". Defaults to
    /// "abortOnFirstFailure".
    #[serde(default)]
    pub import_policy: ImportPolicy,

    /// Storage quota reported by usage estimates, in mebibytes.
    ///
    /// When absent, storage estimation is reported as unsupported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_quota_mb: Option<u64>,

    /// Time limit for a single model call, in milliseconds.
    ///
    /// Defaults to 120000ms (2 minutes). Must be greater than 0.
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// Largest `numberOfVariants` a generation request may ask for.
    ///
    /// Defaults to 4. Must be between 1 and 8.
    #[serde(default = "default_max_variants")]
    pub max_variants: u32,

    /// Origin embedded in minted display handles. Defaults to "product-studio".
    #[serde(default = "default_object_url_origin")]
    pub object_url_origin: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_name: default_store_name(),
            schema_version: default_schema_version(),
            export_format_version: default_export_format_version(),
            import_policy: ImportPolicy::default(),
            storage_quota_mb: None,
            generation_timeout_ms: default_generation_timeout_ms(),
            max_variants: default_max_variants(),
            object_url_origin: default_object_url_origin(),
        }
    }
}

impl StudioConfig {
    /// Validates the configuration and returns errors if any settings are invalid.
    ///
    /// # Returns
    ///
    /// `Ok(())` if all settings are valid, or `Err` with a descriptive error message.
    pub fn validate(&self) -> Result<(), String> {
        if self.store_name.is_empty() {
            return Err("storeName must not be empty".to_string());
        }
        if self.store_name.contains(['/', '\\']) || self.store_name == "." || self.store_name == ".."
        {
            return Err("storeName must be a single path component".to_string());
        }

        if self.schema_version == 0 {
            return Err("schemaVersion must be at least 1".to_string());
        }

        if self.export_format_version == 0 || self.export_format_version > EXPORT_FORMAT_VERSION {
            return Err(format!(
                "exportFormatVersion must be between 1 and {}",
                EXPORT_FORMAT_VERSION
            ));
        }

        if self.generation_timeout_ms == 0 {
            return Err("generationTimeoutMs must be greater than 0".to_string());
        }

        if self.max_variants == 0 || self.max_variants > MAX_VARIANTS_LIMIT {
            return Err(format!(
                "maxVariants must be between 1 and {}",
                MAX_VARIANTS_LIMIT
            ));
        }

        if self.object_url_origin.is_empty() {
            return Err("objectUrlOrigin must not be empty".to_string());
        }

        Ok(())
    }

    /// Returns the model call time limit as a `std::time::Duration`.
    pub fn generation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.generation_timeout_ms)
    }

    /// Returns the storage quota in bytes, if one is configured.
    pub fn storage_quota_bytes(&self) -> Option<u64> {
        self.storage_quota_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// Returns the directory of the configured store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_name)
    }

    /// Merges this configuration with another, using values from `other` where present.
    ///
    /// # Arguments
    ///
    /// * `other` - Configuration to merge with (takes precedence)
    ///
    /// # Returns
    ///
    /// A new `StudioConfig` with merged values.
    pub fn merge(&self, other: &StudioConfig) -> Self {
        Self {
            data_dir: other.data_dir.clone(),
            store_name: other.store_name.clone(),
            schema_version: other.schema_version,
            export_format_version: other.export_format_version,
            import_policy: other.import_policy,
            storage_quota_mb: other.storage_quota_mb.or(self.storage_quota_mb),
            generation_timeout_ms: other.generation_timeout_ms,
            max_variants: other.max_variants,
            object_url_origin: other.object_url_origin.clone(),
        }
    }
}

// Default value functions for serde

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("product-studio")
}

fn default_store_name() -> String {
    "ProductStudioHistory".to_string()
}

fn default_schema_version() -> u32 {
    1
}

fn default_export_format_version() -> u32 {
    EXPORT_FORMAT_VERSION
}

fn default_generation_timeout_ms() -> u64 {
    120_000 // 2 minutes
}

fn default_max_variants() -> u32 {
    4
}

fn default_object_url_origin() -> String {
    crate::object_url::DEFAULT_ORIGIN.to_string()
}
