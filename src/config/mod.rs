//! Configuration management for the product studio.
//!
//! This module provides configuration loading, validation, and access through a singleton pattern.
//! Configuration is read from the "product-studio" key of a settings document and merged with defaults.

pub mod schema;

pub use schema::{StudioConfig, MAX_VARIANTS_LIMIT};

use log::warn;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::path::Path;
use std::sync::RwLock;

/// Key of the studio section in a settings document.
pub const SETTINGS_KEY: &str = "product-studio";

/// Global configuration instance.
///
/// This is lazily initialized on first access and can be updated when settings change.
static CONFIG: Lazy<RwLock<StudioConfig>> = Lazy::new(|| RwLock::new(StudioConfig::default()));

/// Loads configuration from a settings document.
///
/// This function reads the "product-studio" settings, merges them with defaults,
/// validates the result, and updates the global configuration.
///
/// # Arguments
///
/// * `settings_json` - Optional JSON value containing user settings under "product-studio" key
///
/// # Returns
///
/// `Ok(StudioConfig)` with the loaded configuration, or `Err` if validation fails.
///
/// # Example
///
/// ```no_run
/// use product_studio::config::load_config;
/// use serde_json::json;
///
/// let settings = json!({
///     "product-studio": {
///         "maxVariants": 2,
///         "importPolicy": "bestEffort"
///     }
/// });
///
/// let config = load_config(Some(settings)).unwrap();
/// assert_eq!(config.max_variants, 2);
/// ```
pub fn load_config(settings_json: Option<Value>) -> Result<StudioConfig, String> {
    let mut config = StudioConfig::default();

    if let Some(settings) = settings_json {
        if let Some(studio_settings) = settings.get(SETTINGS_KEY) {
            match serde_json::from_value::<StudioConfig>(studio_settings.clone()) {
                Ok(user_config) => {
                    // User settings take precedence
                    config = config.merge(&user_config);
                }
                Err(e) => {
                    warn!(
                        "Failed to parse {} settings: {}. Using defaults.",
                        SETTINGS_KEY, e
                    );
                }
            }
        }
    }

    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    if let Ok(mut global_config) = CONFIG.write() {
        *global_config = config.clone();
    }

    Ok(config)
}

/// Loads configuration from a JSON settings file.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read, is not JSON, or the settings
/// fail validation.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<StudioConfig, String> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    let settings: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Cannot parse {}: {}", path.display(), e))?;
    load_config(Some(settings))
}

/// Gets the current global configuration.
///
/// If configuration has not been loaded yet, returns the default configuration.
pub fn get_config() -> StudioConfig {
    CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_else(|_| StudioConfig::default())
}

/// Updates the global configuration in place.
///
/// If the result fails validation the configuration reverts to defaults.
///
/// # Example
///
/// ```no_run
/// use product_studio::config::update_config;
///
/// update_config(|config| {
///     config.max_variants = 2;
/// });
/// ```
pub fn update_config<F>(updater: F)
where
    F: FnOnce(&mut StudioConfig),
{
    if let Ok(mut config) = CONFIG.write() {
        updater(&mut config);

        if let Err(e) = config.validate() {
            warn!("Configuration validation failed after update: {}", e);
            *config = StudioConfig::default();
        }
    }
}

/// Resets the configuration to defaults.
pub fn reset_config() {
    if let Ok(mut config) = CONFIG.write() {
        *config = StudioConfig::default();
    }
}
