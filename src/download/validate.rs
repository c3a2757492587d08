//! Payload validation: size ceiling and image type detection.
//!
//! Servers frequently omit or mislabel `Content-Type`, so the leading-byte
//! signature is checked independently of the header; either one is enough
//! to accept the payload.

use std::fmt;

use tracing::trace;

use super::DownloadError;

/// Image formats the validator recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// JPEG / JFIF / EXIF.
    Jpeg,
    /// Portable Network Graphics.
    Png,
    /// GIF87a / GIF89a.
    Gif,
    /// WebP (RIFF container).
    Webp,
    /// Windows bitmap.
    Bmp,
    /// TIFF, either byte order.
    Tiff,
    /// Windows icon.
    Ico,
}

impl ImageFormat {
    /// All recognized formats, in signature-check order.
    pub const ALL: [Self; 7] = [
        Self::Jpeg,
        Self::Png,
        Self::Gif,
        Self::Webp,
        Self::Bmp,
        Self::Tiff,
        Self::Ico,
    ];

    /// Canonical MIME type.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Ico => "image/x-icon",
        }
    }

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Bmp => ".bmp",
            Self::Tiff => ".tiff",
            Self::Ico => ".ico",
        }
    }

    /// Looks up a format from a `Content-Type` header value.
    ///
    /// Parameters are ignored and matching is case-insensitive.
    #[must_use]
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" | "image/x-png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "image/bmp" | "image/x-ms-bmp" | "image/x-bmp" => Some(Self::Bmp),
            "image/tiff" | "image/tiff-fx" => Some(Self::Tiff),
            "image/x-icon" | "image/vnd.microsoft.icon" => Some(Self::Ico),
            _ => None,
        }
    }

    /// Detects a format from the leading bytes of a payload.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.matches_signature(bytes))
    }

    fn matches_signature(self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
            Self::Webp => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
            Self::Bmp => bytes.starts_with(b"BM"),
            Self::Tiff => bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"),
            Self::Ico => bytes.starts_with(&[0x00, 0x00, 0x01, 0x00]),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Webp => "WebP",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::Ico => "ICO",
        };
        f.write_str(name)
    }
}

/// Rejects payloads whose declared length exceeds the ceiling.
///
/// Runs on headers alone so oversized bodies are never streamed.
///
/// # Errors
///
/// Returns [`DownloadError::TooLarge`] when `declared_length > max_payload_bytes`.
pub fn check_declared_length(
    url: &str,
    declared_length: Option<u64>,
    max_payload_bytes: u64,
) -> Result<(), DownloadError> {
    match declared_length {
        Some(length) if length > max_payload_bytes => {
            Err(DownloadError::too_large(url, length, max_payload_bytes))
        }
        _ => Ok(()),
    }
}

/// Validates one attempt's payload from its headers and leading bytes.
///
/// Returns the detected format. When both the signature and the header
/// identify a format, the signature wins.
///
/// # Errors
///
/// - [`DownloadError::TooLarge`] when the declared length exceeds the ceiling
/// - [`DownloadError::NotAnImage`] when the body is empty or neither header
///   nor signature is an image
pub fn validate_payload(
    url: &str,
    content_type: Option<&str>,
    leading_bytes: &[u8],
    declared_length: Option<u64>,
    max_payload_bytes: u64,
) -> Result<ImageFormat, DownloadError> {
    check_declared_length(url, declared_length, max_payload_bytes)?;

    if leading_bytes.is_empty() {
        return Err(DownloadError::not_an_image(url, content_type));
    }

    let sniffed = ImageFormat::sniff(leading_bytes);
    let declared = content_type.and_then(ImageFormat::from_mime);
    trace!(url, ?sniffed, ?declared, "validated payload type");

    sniffed
        .or(declared)
        .ok_or_else(|| DownloadError::not_an_image(url, content_type))
}
