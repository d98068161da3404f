//! Structured product description returned by the analysis model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Product metadata extracted from a source photo.
///
/// The named fields are required when decoding (an import document missing
/// any of them is rejected). Any additional fields are kept verbatim in
/// `extra` so they survive an export/import round trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetadata {
    /// Product (strain) name as printed on the packaging.
    pub strain_name: String,

    /// Dominant fruit flavor of the product.
    pub fruit_flavor: String,

    /// Primary packaging color.
    pub primary_color: String,

    /// Secondary packaging colors, in order of prominence.
    pub secondary_colors: Vec<String>,

    /// Free-text notes from the analysis.
    pub notes: String,

    /// Fields not modelled above, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductMetadata {
    /// Creates metadata with the required fields and no extra fields.
    pub fn new(
        strain_name: impl Into<String>,
        fruit_flavor: impl Into<String>,
        primary_color: impl Into<String>,
    ) -> Self {
        Self {
            strain_name: strain_name.into(),
            fruit_flavor: fruit_flavor.into(),
            primary_color: primary_color.into(),
            ..Default::default()
        }
    }

    /// Iterates over every color, primary first.
    pub fn colors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_color.as_str())
            .chain(self.secondary_colors.iter().map(String::as_str))
    }
}
