//! Core data models shared across the crate.
//!
//! This module contains the structured product description extracted by the
//! analysis model, the generation settings that drive image synthesis, and
//! the binary image payload type that every durable image is stored as.

pub mod image;
pub mod metadata;
pub mod settings;

pub use image::ImageBlob;
pub use metadata::ProductMetadata;
pub use settings::{AspectRatio, GenerationSettings, ImageSize};

/// Returns the current instant as epoch milliseconds.
///
/// All record and variant timestamps in this crate use this representation,
/// which is also what the export document carries.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
