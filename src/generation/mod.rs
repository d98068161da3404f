//! Generation pipeline: analyze a product photo, render variants, record
//! the result.
//!
//! The hosted model sits behind the [`ImageModel`] trait. A batch of
//! variants is requested concurrently and the history record is written
//! once, after every variant has arrived. A single failed call fails the
//! whole batch and nothing is written, so a failed run never touches
//! previously stored history.

pub mod error;

pub use error::{ModelError, StudioError};

use crate::config::{get_config, StudioConfig};
use crate::history::{GeneratedImage, HistoryRecord, HistoryStore, SourceImage};
use crate::models::{GenerationSettings, ImageBlob, ProductMetadata};
use crate::object_url::ObjectUrlRegistry;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Hosted model client.
pub trait ImageModel: Send + Sync + 'static {
    /// Extracts product metadata from a photo.
    fn analyze_image(
        &self,
        image: &ImageBlob,
    ) -> impl Future<Output = Result<ProductMetadata, ModelError>> + Send;

    /// Renders one marketing image of the product.
    fn generate_image(
        &self,
        image: &ImageBlob,
        metadata: &ProductMetadata,
        settings: &GenerationSettings,
    ) -> impl Future<Output = Result<ImageBlob, ModelError>> + Send;
}

/// Runs generation against one model.
#[derive(Debug)]
pub struct Generator<M> {
    model: Arc<M>,
    timeout: Duration,
    max_variants: u32,
}

impl<M> Clone for Generator<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            timeout: self.timeout,
            max_variants: self.max_variants,
        }
    }
}

impl<M: ImageModel> Generator<M> {
    /// Creates a generator using the global configuration.
    pub fn new(model: Arc<M>) -> Self {
        Self::from_config(model, &get_config())
    }

    /// Creates a generator with limits taken from `config`.
    pub fn from_config(model: Arc<M>, config: &StudioConfig) -> Self {
        Self {
            model,
            timeout: config.generation_timeout(),
            max_variants: config.max_variants,
        }
    }

    /// Overrides the per-call time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-call time limit.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extracts product metadata from `source`.
    pub async fn analyze(&self, source: &ImageBlob) -> Result<ProductMetadata, ModelError> {
        with_timeout(self.timeout, self.model.analyze_image(source)).await
    }

    /// Requests `settings.number_of_variants` images concurrently.
    ///
    /// # Returns
    ///
    /// The variants in request order.
    ///
    /// # Errors
    ///
    /// Returns the first failure; every call still in flight is aborted.
    pub async fn generate_variants(
        &self,
        source: &ImageBlob,
        metadata: &ProductMetadata,
        settings: &GenerationSettings,
    ) -> Result<Vec<GeneratedImage>, ModelError> {
        let count = settings.number_of_variants as usize;
        let mut calls = JoinSet::new();

        for index in 0..count {
            let model = Arc::clone(&self.model);
            let source = source.clone();
            let metadata = metadata.clone();
            let settings = settings.clone();
            let limit = self.timeout;

            calls.spawn(async move {
                let result =
                    with_timeout(limit, model.generate_image(&source, &metadata, &settings)).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<GeneratedImage>> = vec![None; count];
        while let Some(joined) = calls.join_next().await {
            let (index, result) = joined
                .map_err(|e| ModelError::Unknown(format!("generation task failed: {}", e)))?;
            match result {
                Ok(blob) if blob.is_empty() => {
                    calls.abort_all();
                    return Err(ModelError::NoImageData);
                }
                Ok(blob) => slots[index] = Some(GeneratedImage::new(blob)),
                Err(err) => {
                    warn!("Variant {} of {} failed: {}", index + 1, count, err);
                    calls.abort_all();
                    return Err(err);
                }
            }
        }

        debug!("Generated {} variant(s)", count);
        Ok(slots.into_iter().flatten().collect())
    }

    /// Full run: analyze, generate, store one record, mint display handles.
    ///
    /// # Arguments
    ///
    /// * `store` - Where the new record is written
    /// * `registry` - Receives the display handles of the new variants
    /// * `source` - Product photo
    /// * `settings` - Generation settings
    ///
    /// # Returns
    ///
    /// The stored record with display handles attached.
    pub async fn run(
        &self,
        store: &HistoryStore,
        registry: &mut ObjectUrlRegistry,
        source: ImageBlob,
        settings: GenerationSettings,
    ) -> Result<HistoryRecord, StudioError> {
        settings
            .validate(self.max_variants)
            .map_err(StudioError::InvalidSettings)?;

        let metadata = self.analyze(&source).await?;
        let variants = self.generate_variants(&source, &metadata, &settings).await?;

        let mut record =
            HistoryRecord::new(metadata, SourceImage::Blob(source), variants, settings);
        store.put(&record).await?;
        record.attach_object_urls(registry);

        info!(
            "Generated record {} with {} variant(s)",
            record.id,
            record.variants.len()
        );
        Ok(record)
    }

    /// Generates another batch for an existing record.
    ///
    /// New variants are placed before the existing ones and the record is
    /// stored again. Display handles are minted for the new variants only;
    /// `record` is left unchanged if anything fails.
    ///
    /// # Returns
    ///
    /// The number of variants added.
    pub async fn regenerate(
        &self,
        store: &HistoryStore,
        registry: &mut ObjectUrlRegistry,
        record: &mut HistoryRecord,
        settings: GenerationSettings,
    ) -> Result<usize, StudioError> {
        settings
            .validate(self.max_variants)
            .map_err(StudioError::InvalidSettings)?;

        let source = record
            .source_image
            .as_blob()
            .cloned()
            .ok_or_else(|| StudioError::SourceUnavailable(record.id.clone()))?;

        let variants = self
            .generate_variants(&source, &record.metadata, &settings)
            .await?;
        let added = variants.len();

        let mut updated = record.clone();
        updated.settings = settings;
        updated.merge_variants(variants);
        store.put(&updated).await?;

        for variant in updated.variants.iter_mut().take(added) {
            if let Some(blob) = &variant.blob {
                variant.url = registry.create_object_url(blob);
            }
        }
        *record = updated;

        info!("Added {} variant(s) to record {}", added, record.id);
        Ok(added)
    }
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ModelError>>,
) -> Result<T, ModelError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ModelError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Returns a distinct one-byte image per call, failing on call number
    /// `fail_on` if set.
    struct MockModel {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        delay: Duration,
    }

    impl MockModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                delay: Duration::ZERO,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }
    }

    impl ImageModel for MockModel {
        async fn analyze_image(&self, _image: &ImageBlob) -> Result<ProductMetadata, ModelError> {
            Ok(ProductMetadata::new("Blue Dream", "Blueberry", "blue"))
        }

        async fn generate_image(
            &self,
            _image: &ImageBlob,
            _metadata: &ProductMetadata,
            _settings: &GenerationSettings,
        ) -> Result<ImageBlob, ModelError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_on == Some(call) {
                return Err(ModelError::QuotaExceeded("rate limited".to_string()));
            }
            Ok(ImageBlob::new(vec![call as u8], "image/png"))
        }
    }

    fn source() -> ImageBlob {
        ImageBlob::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg")
    }

    fn settings(variants: u32) -> GenerationSettings {
        GenerationSettings {
            number_of_variants: variants,
            ..Default::default()
        }
    }

    fn generator(model: MockModel) -> Generator<MockModel> {
        Generator::from_config(Arc::new(model), &StudioConfig::default())
    }

    async fn create_test_store() -> (HistoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path(), "GenerationTest", 1)
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_generate_variants_count() {
        let generator = generator(MockModel::new());
        let metadata = generator.analyze(&source()).await.unwrap();

        let variants = generator
            .generate_variants(&source(), &metadata, &settings(3))
            .await
            .unwrap();

        assert_eq!(variants.len(), 3);
        let mut bytes: Vec<u8> = variants
            .iter()
            .map(|v| v.blob.as_ref().unwrap().as_bytes()[0])
            .collect();
        bytes.sort();
        assert_eq!(bytes, vec![0, 1, 2]);
        assert!(variants.iter().all(|v| v.url.is_empty()));
    }

    #[tokio::test]
    async fn test_generate_variants_fails_whole_batch() {
        let generator = generator(MockModel::failing_on(1));
        let metadata = ProductMetadata::default();

        let result = generator
            .generate_variants(&source(), &metadata, &settings(3))
            .await;

        assert_eq!(
            result.unwrap_err(),
            ModelError::QuotaExceeded("rate limited".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_times_out() {
        let generator =
            generator(MockModel::slow(Duration::from_secs(10))).with_timeout(Duration::from_secs(1));

        let result = generator
            .generate_variants(&source(), &ProductMetadata::default(), &settings(1))
            .await;

        assert_eq!(result.unwrap_err(), ModelError::Timeout);
    }

    #[tokio::test]
    async fn test_run_stores_record_and_mints_handles() {
        let (store, _temp_dir) = create_test_store().await;
        let generator = generator(MockModel::new());
        let mut registry = ObjectUrlRegistry::new();

        let record = generator
            .run(&store, &mut registry, source(), settings(2))
            .await
            .unwrap();

        assert_eq!(record.metadata.strain_name, "Blue Dream");
        assert_eq!(record.variants.len(), 2);
        assert_eq!(record.object_urls().count(), 2);
        assert_eq!(registry.live_count(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_failure_keeps_history() {
        let (store, _temp_dir) = create_test_store().await;
        let mut registry = ObjectUrlRegistry::new();
        generator(MockModel::new())
            .run(&store, &mut registry, source(), settings(1))
            .await
            .unwrap();

        let failing = generator(MockModel::failing_on(0));
        let result = failing
            .run(&store, &mut registry, source(), settings(2))
            .await;

        assert!(matches!(result, Err(StudioError::Model(_))));
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_settings() {
        let (store, _temp_dir) = create_test_store().await;
        let mut registry = ObjectUrlRegistry::new();
        let generator = generator(MockModel::new());

        for variants in [0, 9] {
            let result = generator
                .run(&store, &mut registry, source(), settings(variants))
                .await;
            assert!(matches!(result, Err(StudioError::InvalidSettings(_))));
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_regenerate_prepends_variants() {
        let (store, _temp_dir) = create_test_store().await;
        let mut registry = ObjectUrlRegistry::new();
        let generator = generator(MockModel::new());

        let mut record = generator
            .run(&store, &mut registry, source(), settings(1))
            .await
            .unwrap();
        let original_variant = record.variants[0].id.clone();

        let added = generator
            .regenerate(&store, &mut registry, &mut record, settings(2))
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(record.variants.len(), 3);
        assert_eq!(record.variants[2].id, original_variant);
        assert_eq!(record.settings.number_of_variants, 2);
        assert_eq!(registry.live_count(), 3);

        let stored = store.get_all_raw().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].variants.len(), 3);
    }

    #[tokio::test]
    async fn test_regenerate_requires_source_bytes() {
        let (store, _temp_dir) = create_test_store().await;
        let mut registry = ObjectUrlRegistry::new();
        let generator = generator(MockModel::new());

        let mut record = HistoryRecord::new(
            ProductMetadata::default(),
            SourceImage::Reference("legacy.jpg".to_string()),
            Vec::new(),
            settings(1),
        );

        let result = generator
            .regenerate(&store, &mut registry, &mut record, settings(1))
            .await;
        assert!(matches!(result, Err(StudioError::SourceUnavailable(_))));
    }
}
