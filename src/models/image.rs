//! Binary image payloads.

use crate::codec::sniff_mime_type;
use std::fmt;
use std::sync::Arc;

/// An image held in memory as raw bytes plus its MIME type.
///
/// The byte buffer is reference counted, so cloning a blob (for example when
/// handing it to the object URL registry or to a concurrent generation task)
/// never copies the image data.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    /// Raw encoded image bytes (PNG, JPEG, ...).
    pub bytes: Arc<[u8]>,

    /// MIME type of `bytes`, e.g. `image/png`.
    pub mime_type: String,
}

impl ImageBlob {
    /// Creates a blob with an explicit MIME type.
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Creates a blob and infers its MIME type from the leading magic bytes.
    ///
    /// Unknown formats are labelled `application/octet-stream`.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let mime_type = sniff_mime_type(&bytes).to_string();
        Self { bytes, mime_type }
    }

    /// Number of bytes in the payload.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrows the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
