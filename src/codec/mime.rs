//! MIME type detection from magic bytes.

/// Label used when the image format cannot be recognised.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Infers an image MIME type from the leading bytes of a payload.
///
/// Recognises PNG, JPEG, GIF, WebP, BMP and AVIF/HEIC containers; anything
/// else is reported as [`DEFAULT_MIME_TYPE`].
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"BM") && bytes.len() >= 14 {
        "image/bmp"
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        match &bytes[8..12] {
            b"avif" | b"avis" => "image/avif",
            b"heic" | b"heix" | b"mif1" => "image/heic",
            _ => DEFAULT_MIME_TYPE,
        }
    } else {
        DEFAULT_MIME_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_common_formats() {
        assert_eq!(
            sniff_mime_type(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            "image/png"
        );
        assert_eq!(sniff_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_mime_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime_type(b"\x00\x00\x00\x1cftypavif"), "image/avif");
    }

    #[test]
    fn test_sniff_unknown() {
        assert_eq!(sniff_mime_type(b"plain text"), DEFAULT_MIME_TYPE);
        assert_eq!(sniff_mime_type(&[]), DEFAULT_MIME_TYPE);
        // Too short to be a bitmap header
        assert_eq!(sniff_mime_type(b"BM"), DEFAULT_MIME_TYPE);
    }
}
