//! Binary/text conversion for image payloads.
//!
//! Durable images are always binary. Whenever an image has to travel through
//! a text-only channel (the export document, a list thumbnail) it is encoded
//! as a base64 `data:` URL, which is reversible byte for byte.
//!
//! # Example
//!
//! ```
//! use product_studio::codec::{decode_data_url, encode_data_url};
//! use product_studio::models::ImageBlob;
//!
//! let blob = ImageBlob::new(vec![1u8, 2, 3], "image/png");
//! let text = encode_data_url(&blob);
//! assert_eq!(text, "data:image/png;base64,AQID");
//! assert_eq!(decode_data_url(&text).unwrap(), blob);
//! ```

pub mod mime;

pub use mime::{sniff_mime_type, DEFAULT_MIME_TYPE};

use crate::models::ImageBlob;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Prefix every data URL starts with.
pub const DATA_URL_PREFIX: &str = "data:";

/// Matches `data:[<mime>][;param]*,<payload>`.
static DATA_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?P<mime>[^;,]*)(?P<params>(?:;[^;,]*)*),(?P<payload>.*)$")
        .expect("Failed to compile data URL regex")
});

/// Errors produced when decoding a text-safe image representation.
#[derive(Debug)]
pub enum CodecError {
    /// The text is not a `data:` URL at all.
    NotDataUrl,

    /// The data URL does not declare `;base64` encoding.
    NotBase64Encoded,

    /// The payload is not valid base64.
    InvalidBase64(base64::DecodeError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::NotDataUrl => write!(f, "Not a data URL"),
            CodecError::NotBase64Encoded => write!(f, "Data URL is not base64 encoded"),
            CodecError::InvalidBase64(err) => write!(f, "Invalid base64 payload: {}", err),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::InvalidBase64(err) => Some(err),
            _ => None,
        }
    }
}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        CodecError::InvalidBase64(err)
    }
}

/// Checks whether a string looks like a data URL.
///
/// This is a cheap prefix test used to tell encoded images apart from
/// legacy pass-through references; it does not validate the payload.
pub fn is_data_url(text: &str) -> bool {
    text.starts_with(DATA_URL_PREFIX)
}

/// Encodes a blob as `data:<mime>;base64,<payload>`.
///
/// A blob without a MIME type is labelled `application/octet-stream`.
pub fn encode_data_url(blob: &ImageBlob) -> String {
    let mime_type = if blob.mime_type.is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        blob.mime_type.as_str()
    };

    let payload = STANDARD.encode(blob.as_bytes());
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + mime_type.len() + 8 + payload.len());
    url.push_str(DATA_URL_PREFIX);
    url.push_str(mime_type);
    url.push_str(";base64,");
    url.push_str(&payload);
    url
}

/// Decodes a base64 data URL back into the exact original bytes.
///
/// When the URL carries no MIME type, the type is sniffed from the decoded
/// bytes instead.
///
/// # Errors
///
/// Returns `CodecError` if the text is not a data URL, is not base64
/// encoded, or carries a malformed payload.
pub fn decode_data_url(text: &str) -> Result<ImageBlob, CodecError> {
    let captures = DATA_URL_REGEX
        .captures(text.trim())
        .ok_or(CodecError::NotDataUrl)?;

    let is_base64 = captures
        .name("params")
        .map(|params| {
            params
                .as_str()
                .split(';')
                .any(|param| param.trim().eq_ignore_ascii_case("base64"))
        })
        .unwrap_or(false);
    if !is_base64 {
        return Err(CodecError::NotBase64Encoded);
    }

    let payload = captures.name("payload").map(|m| m.as_str()).unwrap_or("");
    let bytes = STANDARD.decode(payload.trim())?;

    let mime_type = captures
        .name("mime")
        .map(|m| m.as_str().trim())
        .filter(|mime| !mime.is_empty());

    Ok(match mime_type {
        Some(mime) => ImageBlob::new(bytes, mime),
        None => ImageBlob::from_bytes(bytes),
    })
}
