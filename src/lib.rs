//! Product Studio: history, export/import and generation pipeline for
//! product marketing images.
//!
//! A product photo goes in, a hosted model extracts structured metadata and
//! renders styled marketing variants, and the result is kept in a local,
//! crash-safe history that can be browsed, exported to a single portable
//! document and imported again.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - **models**: Image payloads, product metadata and generation settings
//! - **codec**: Text-safe (data URL) encoding of binary images
//! - **object_url**: Display handles minted for in-memory images
//! - **history**: Persistent store, export/import engine, search and listing
//! - **capacity**: Storage usage, quota and durability of the history location
//! - **generation**: Model collaborator trait and the concurrent variant pipeline
//! - **session**: Ties a store to the handles one interactive session holds
//! - **config**: User settings with validation and a global accessor
//!
//! # Display handles
//!
//! The only durable image representation is the binary blob. Display
//! handles (`blob:<origin>/<uuid>`) are minted on every read, stripped on
//! every write, and released through the [`ObjectUrlRegistry`] that minted
//! them. Registries are owned by whoever displays the images; there is no
//! process-wide registry.
//!
//! # Example
//!
//! ```no_run
//! use product_studio::history::{export_history, HistoryStore};
//! use product_studio::object_url::ObjectUrlRegistry;
//!
//! # async fn demo() -> Result<(), product_studio::history::HistoryError> {
//! let store = HistoryStore::open("/tmp/studio", "ProductStudioHistory", 1).await?;
//!
//! let mut registry = ObjectUrlRegistry::new();
//! for record in store.get_all(&mut registry).await? {
//!     println!("{} ({} variants)", record.metadata.strain_name, record.variants.len());
//! }
//!
//! let document = export_history(&store, 1).await?;
//! # let _ = document;
//! # Ok(())
//! # }
//! ```

pub mod capacity;
pub mod codec;
pub mod config;
pub mod generation;
pub mod history;
pub mod models;
pub mod object_url;
pub mod session;

pub use capacity::{CapacityProbe, StorageEstimate};
pub use codec::{decode_data_url, encode_data_url, CodecError};
pub use config::StudioConfig;
pub use generation::{Generator, ImageModel, ModelError, StudioError};
pub use history::{
    GeneratedImage, HistoryError, HistoryRecord, HistoryStore, ImportPolicy, ImportSummary,
    SourceImage,
};
pub use models::{AspectRatio, GenerationSettings, ImageBlob, ImageSize, ProductMetadata};
pub use object_url::ObjectUrlRegistry;
pub use session::StudioSession;
