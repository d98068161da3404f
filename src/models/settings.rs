//! Generation settings captured alongside every history record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Output aspect ratio requested from the image model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "4:5")]
    Portrait4x5,
    #[serde(rename = "5:4")]
    Landscape5x4,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "21:9")]
    Ultrawide21x9,
}

impl AspectRatio {
    /// Returns the ratio in `W:H` notation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Ultrawide21x9 => "21:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution tier requested from the image model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The generation configuration in effect when a batch of variants was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,

    /// Output resolution tier.
    pub image_size: ImageSize,

    /// How many variants one generation batch produces.
    pub number_of_variants: u32,

    /// Free-text instructions appended to the generation prompt.
    #[serde(default)]
    pub additional_instructions: String,

    /// New York styling mode.
    #[serde(default)]
    pub ny_mode: bool,

    /// Any other named boolean generation modes.
    #[serde(flatten)]
    pub modes: BTreeMap<String, bool>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::default(),
            image_size: ImageSize::default(),
            number_of_variants: 1,
            additional_instructions: String::new(),
            ny_mode: false,
            modes: BTreeMap::new(),
        }
    }
}

impl GenerationSettings {
    /// Checks the variant count against the configured upper bound.
    ///
    /// # Returns
    ///
    /// `Ok(())` if `number_of_variants` is between 1 and `max_variants`.
    pub fn validate(&self, max_variants: u32) -> Result<(), String> {
        if self.number_of_variants == 0 {
            return Err("numberOfVariants must be at least 1".to_string());
        }
        if self.number_of_variants > max_variants {
            return Err(format!(
                "numberOfVariants must be at most {} (got {})",
                max_variants, self.number_of_variants
            ));
        }
        Ok(())
    }

    /// Returns whether a named mode is switched on.
    ///
    /// `nyMode` is looked up by its serialized name as well.
    pub fn mode_enabled(&self, name: &str) -> bool {
        if name == "nyMode" {
            return self.ny_mode;
        }
        self.modes.get(name).copied().unwrap_or(false)
    }
}
