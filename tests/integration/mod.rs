//! Integration tests for Product Studio.
//!
//! Shared fixtures: temporary stores, record builders and a scripted image
//! model standing in for the hosted service.

pub mod generation_test;
pub mod history_store_test;
pub mod transfer_test;

use product_studio::generation::{ImageModel, ModelError};
use product_studio::history::{GeneratedImage, HistoryRecord, HistoryStore, SourceImage};
use product_studio::models::{GenerationSettings, ImageBlob, ProductMetadata};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Opens a fresh store in its own temporary directory.
pub async fn open_temp_store() -> (HistoryStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = HistoryStore::open(temp_dir.path(), "ProductStudioHistory", 1)
        .await
        .unwrap();
    (store, temp_dir)
}

/// Builds a record with a binary source image and `variants` binary variants.
pub fn sample_record(id: &str, timestamp: i64, variants: usize) -> HistoryRecord {
    let mut metadata = ProductMetadata::new("Blue Dream", "Blueberry", "blue");
    metadata.secondary_colors = vec!["silver".to_string()];
    metadata
        .extra
        .insert("thcPercent".to_string(), serde_json::json!(21.5));

    let mut settings = GenerationSettings::default();
    settings.number_of_variants = variants.max(1) as u32;
    settings.ny_mode = true;

    let mut record = HistoryRecord::new(
        metadata,
        SourceImage::Blob(ImageBlob::new(
            (0..=255u8).rev().collect::<Vec<u8>>(),
            "image/jpeg",
        )),
        (0..variants)
            .map(|i| {
                GeneratedImage::new(ImageBlob::new(
                    vec![i as u8, 0, 0xFF, 0x10, 0x80],
                    "image/png",
                ))
            })
            .collect(),
        settings,
    );
    record.id = id.to_string();
    record.timestamp = timestamp;
    record
}

/// Image model that answers from a script instead of the network.
pub struct ScriptedModel {
    calls: AtomicUsize,
    fail_generation_with: Option<ModelError>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_generation_with: None,
        }
    }

    pub fn failing(error: ModelError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_generation_with: Some(error),
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageModel for ScriptedModel {
    async fn analyze_image(&self, image: &ImageBlob) -> Result<ProductMetadata, ModelError> {
        if image.is_empty() {
            return Err(ModelError::NoImageData);
        }
        Ok(ProductMetadata::new("Gelato", "Peach", "orange"))
    }

    async fn generate_image(
        &self,
        _image: &ImageBlob,
        metadata: &ProductMetadata,
        settings: &GenerationSettings,
    ) -> Result<ImageBlob, ModelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_generation_with {
            return Err(error.clone());
        }
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(metadata.strain_name.as_bytes());
        bytes.extend_from_slice(settings.aspect_ratio.as_str().as_bytes());
        bytes.push(call as u8);
        Ok(ImageBlob::from_bytes(bytes))
    }
}
