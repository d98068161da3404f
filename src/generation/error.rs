//! Error types for model calls and the generation pipeline.

use crate::history::HistoryError;
use std::fmt;

/// Failures reported by the hosted image model.
///
/// These pass through the pipeline untouched; the caller decides whether a
/// whole operation is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The model endpoint could not be reached.
    Network(String),

    /// The account has run out of quota or is rate limited.
    QuotaExceeded(String),

    /// The API credential was rejected.
    InvalidCredential(String),

    /// The request or the result was blocked by content filtering.
    ContentFiltered(String),

    /// The model answered without returning an image.
    NoImageData,

    /// The call did not finish within the configured time limit.
    Timeout,

    /// Any other failure.
    Unknown(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Network(msg) => write!(f, "Network error: {}", msg),
            ModelError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            ModelError::InvalidCredential(msg) => write!(f, "Invalid credential: {}", msg),
            ModelError::ContentFiltered(msg) => write!(f, "Content filtered: {}", msg),
            ModelError::NoImageData => write!(f, "Model returned no image data"),
            ModelError::Timeout => write!(f, "Model call timed out"),
            ModelError::Unknown(msg) => write!(f, "Model error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Errors surfaced by a studio session or generation run.
#[derive(Debug)]
pub enum StudioError {
    /// Reading or writing history failed.
    History(HistoryError),

    /// A model call failed.
    Model(ModelError),

    /// The requested generation settings are out of bounds.
    InvalidSettings(String),

    /// The record has no source image bytes to generate from.
    SourceUnavailable(String),
}

impl fmt::Display for StudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudioError::History(err) => write!(f, "{}", err),
            StudioError::Model(err) => write!(f, "{}", err),
            StudioError::InvalidSettings(msg) => write!(f, "Invalid generation settings: {}", msg),
            StudioError::SourceUnavailable(id) => {
                write!(f, "Source image unavailable for record {}", id)
            }
        }
    }
}

impl std::error::Error for StudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StudioError::History(err) => Some(err),
            StudioError::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HistoryError> for StudioError {
    fn from(err: HistoryError) -> Self {
        StudioError::History(err)
    }
}

impl From<ModelError> for StudioError {
    fn from(err: ModelError) -> Self {
        StudioError::Model(err)
    }
}
