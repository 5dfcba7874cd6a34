//! Base64 data URI encoding and decoding

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;

use crate::error::{AppError, Result};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Image formats recognised from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "image/bmp" => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// Pixel dimensions of an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    pub fn longer_side(&self) -> usize {
        self.width.max(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A validated `data:<mime>;base64,<payload>` string.
///
/// The full string is kept so the value can be sent over the wire without
/// re-encoding; `mime` and `payload` are views into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataUri {
    uri: String,
    mime_end: usize,
    payload_start: usize,
}

impl DataUri {
    /// Encode raw image bytes, sniffing the MIME type (PNG when unknown)
    pub fn from_bytes(data: &[u8]) -> Self {
        let mime = detect_image_format(data)
            .unwrap_or(ImageFormat::Png)
            .mime();
        Self::from_bytes_with_mime(data, mime)
    }

    /// Encode raw bytes under an explicit MIME type
    pub fn from_bytes_with_mime(data: &[u8], mime: &str) -> Self {
        let uri = format!("{}{}{}{}", DATA_PREFIX, mime, BASE64_MARKER, STANDARD.encode(data));
        let mime_end = DATA_PREFIX.len() + mime.len();
        Self {
            uri,
            mime_end,
            payload_start: mime_end + BASE64_MARKER.len(),
        }
    }

    /// Read an image file and encode it
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref()).await?;
        if data.is_empty() {
            return Err(AppError::InvalidDataUri(format!(
                "{} is empty",
                path.as_ref().display()
            )));
        }
        Ok(Self::from_bytes(&data))
    }

    /// Parse a strict data URI
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let rest = s
            .strip_prefix(DATA_PREFIX)
            .ok_or_else(|| AppError::InvalidDataUri("missing 'data:' prefix".to_string()))?;
        let marker = rest
            .find(BASE64_MARKER)
            .ok_or_else(|| AppError::InvalidDataUri("missing ';base64,' marker".to_string()))?;

        let mime = &rest[..marker];
        if !mime.contains('/') {
            return Err(AppError::InvalidDataUri(format!(
                "invalid MIME type '{}'",
                mime
            )));
        }

        let mime_end = DATA_PREFIX.len() + marker;
        let payload_start = mime_end + BASE64_MARKER.len();
        let payload = &s[payload_start..];
        if payload.is_empty() {
            return Err(AppError::InvalidDataUri("empty payload".to_string()));
        }
        STANDARD
            .decode(payload)
            .map_err(|e| AppError::InvalidDataUri(format!("invalid base64 data: {}", e)))?;

        Ok(Self {
            uri: s.to_string(),
            mime_end,
            payload_start,
        })
    }

    /// Parse a data URI, also accepting bare base64 (MIME is then sniffed)
    pub fn parse_lenient(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with(DATA_PREFIX) {
            return Self::parse(s);
        }

        let data = STANDARD
            .decode(s)
            .map_err(|e| AppError::InvalidDataUri(format!("invalid base64 data: {}", e)))?;
        if data.is_empty() {
            return Err(AppError::InvalidDataUri("empty payload".to_string()));
        }
        Ok(Self::from_bytes(&data))
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn mime(&self) -> &str {
        &self.uri[DATA_PREFIX.len()..self.mime_end]
    }

    /// Base64 payload without the prefix
    pub fn payload(&self) -> &str {
        &self.uri[self.payload_start..]
    }

    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime(self.mime())
    }

    /// File extension implied by the MIME type (`bin` when not an image)
    pub fn extension(&self) -> &'static str {
        self.format().map(|f| f.extension()).unwrap_or("bin")
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.payload())
            .map_err(|e| AppError::InvalidDataUri(format!("invalid base64 data: {}", e)))
    }

    /// Read width and height from the encoded image header
    pub fn dimensions(&self) -> Result<Dimensions> {
        let data = self.decode()?;
        let size = imagesize::blob_size(&data)
            .map_err(|e| AppError::InvalidDataUri(format!("unreadable image header: {:?}", e)))?;
        Ok(Dimensions {
            width: size.width,
            height: size.height,
        })
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads are large; show the header and size only
        write!(f, "data:{};base64,<{} chars>", self.mime(), self.payload().len())
    }
}

impl TryFrom<String> for DataUri {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DataUri> for String {
    fn from(value: DataUri) -> Self {
        value.uri
    }
}

impl std::str::FromStr for DataUri {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<ImageFormat> {
    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(ImageFormat::Png);
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }

    if data.len() >= 14 && data.starts_with(b"BM") {
        return Some(ImageFormat::Bmp);
    }

    None
}
