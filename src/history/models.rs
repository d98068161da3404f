//! Data models for generation history.
//!
//! A [`HistoryRecord`] captures one completed generation session: the
//! source photo, the metadata extracted from it, the settings used and
//! every variant produced.

use crate::models::{now_millis, GenerationSettings, ImageBlob, ProductMetadata};
use crate::object_url::ObjectUrlRegistry;

/// One generated marketing image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Unique identifier for this variant.
    pub id: String,

    /// Session-local display handle.
    ///
    /// Never persisted: it is empty at rest and re-minted from `blob` every
    /// time the record is read back.
    pub url: String,

    /// The image payload. This is the only durable representation.
    pub blob: Option<ImageBlob>,

    /// When this variant was produced (epoch milliseconds).
    pub timestamp: i64,
}

impl GeneratedImage {
    /// Creates a variant for a freshly generated image.
    pub fn new(blob: ImageBlob) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: String::new(),
            blob: Some(blob),
            timestamp: now_millis(),
        }
    }

    /// Whether a display handle is currently attached.
    pub fn has_url(&self) -> bool {
        !self.url.is_empty()
    }
}

/// The original uploaded photo.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceImage {
    /// The photo bytes.
    Blob(ImageBlob),

    /// A legacy text reference (for example a stored data URL or remote
    /// address) kept verbatim.
    Reference(String),
}

impl SourceImage {
    /// Returns the binary payload, if this source is held as binary.
    pub fn as_blob(&self) -> Option<&ImageBlob> {
        match self {
            SourceImage::Blob(blob) => Some(blob),
            SourceImage::Reference(_) => None,
        }
    }
}

/// A single generation session in history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    /// Unique identifier, immutable once created.
    ///
    /// Storing a record whose id already exists replaces the stored one.
    pub id: String,

    /// Creation or last update instant (epoch milliseconds).
    pub timestamp: i64,

    /// Product description extracted from the source photo.
    pub metadata: ProductMetadata,

    /// The uploaded photo.
    pub source_image: SourceImage,

    /// Variants in generation order.
    pub variants: Vec<GeneratedImage>,

    /// Settings the variants were produced with.
    pub settings: GenerationSettings,

    /// Small preview encoded as a data URL, for lightweight list rendering.
    pub thumbnail: Option<String>,
}

impl HistoryRecord {
    /// Creates a record with a fresh id and the current timestamp.
    pub fn new(
        metadata: ProductMetadata,
        source_image: SourceImage,
        variants: Vec<GeneratedImage>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            metadata,
            source_image,
            variants,
            settings,
            thumbnail: None,
        }
    }

    /// Sets the list thumbnail.
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Returns a copy with every variant display handle cleared.
    ///
    /// This is what gets written to storage; image bytes are shared, not
    /// copied.
    pub fn strip_object_urls(&self) -> Self {
        let mut stripped = self.clone();
        for variant in &mut stripped.variants {
            variant.url.clear();
        }
        stripped
    }

    /// Mints a display handle for every variant that has a blob.
    ///
    /// Variants without a blob get an empty handle. Any handle already
    /// attached is replaced, not revoked; callers release old handles first.
    ///
    /// # Returns
    ///
    /// The number of handles minted.
    pub fn attach_object_urls(&mut self, registry: &mut ObjectUrlRegistry) -> usize {
        let mut minted = 0;
        for variant in &mut self.variants {
            variant.url = match &variant.blob {
                Some(blob) => {
                    minted += 1;
                    registry.create_object_url(blob)
                }
                None => String::new(),
            };
        }
        minted
    }

    /// Revokes every attached display handle and clears it.
    ///
    /// # Returns
    ///
    /// The number of handles that were live and have been released.
    pub fn release_object_urls(&mut self, registry: &mut ObjectUrlRegistry) -> usize {
        let mut released = 0;
        for variant in &mut self.variants {
            if variant.has_url() && registry.revoke(&variant.url) {
                released += 1;
            }
            variant.url.clear();
        }
        released
    }

    /// Places newly generated variants before the existing ones and bumps
    /// the record timestamp.
    pub fn merge_variants(&mut self, new_variants: Vec<GeneratedImage>) {
        let mut merged = new_variants;
        merged.append(&mut self.variants);
        self.variants = merged;
        self.timestamp = now_millis();
    }

    /// Iterates over the attached (non-empty) display handles.
    pub fn object_urls(&self) -> impl Iterator<Item = &str> {
        self.variants
            .iter()
            .filter(|v| v.has_url())
            .map(|v| v.url.as_str())
    }
}
