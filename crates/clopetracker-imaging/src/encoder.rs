//! Output formats and encoders for normalized avatars.
//!
//! The normalizer holds an ordered list of [`AvatarEncoder`]s and keeps the
//! first one that succeeds, so a missing or broken primary codec degrades to
//! the next format instead of failing the upload.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{ImagingError, Result};

/// Encoded output format of a normalized avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type. JPEG is always `image/jpeg`, never `image/jpg`.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Webp => write!(f, "webp"),
            Self::Jpeg => write!(f, "jpeg"),
        }
    }
}

/// An encoder turning an RGB pixel buffer into file bytes.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait AvatarEncoder: Send + Sync {
    /// Format produced on success.
    fn format(&self) -> OutputFormat;

    /// Encode the pixel buffer.
    fn encode(&self, img: &RgbImage) -> Result<Vec<u8>>;
}

/// Lossy WebP encoder backed by libwebp.
///
/// Uses the slowest, best-compressing method since avatars are encoded once
/// and served many times.
#[derive(Debug, Clone, Copy)]
pub struct WebpEncoder {
    quality: u8,
}

impl WebpEncoder {
    /// libwebp method 0 (fast) to 6 (smallest output).
    const METHOD: i32 = 6;

    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl AvatarEncoder for WebpEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Webp
    }

    fn encode(&self, img: &RgbImage) -> Result<Vec<u8>> {
        let mut config = webp::WebPConfig::new()
            .map_err(|()| ImagingError::encoding("webp: libwebp rejected default config"))?;
        config.lossless = 0;
        config.quality = f32::from(self.quality);
        config.method = Self::METHOD;

        let encoded = webp::Encoder::from_rgb(img.as_raw(), img.width(), img.height())
            .encode_advanced(&config)
            .map_err(|e| ImagingError::encoding(format!("webp: {e:?}")))?;
        Ok(encoded.to_vec())
    }
}

/// Baseline JPEG encoder with a fixed quality.
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl AvatarEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(&self, img: &RgbImage) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.quality);
        img.write_with_encoder(encoder)
            .map_err(|e| ImagingError::encoding(format!("jpeg: {e}")))?;
        Ok(buf)
    }
}

/// Build the encoder chain for the given format preference order.
pub fn encoders_for(formats: &[OutputFormat], quality: u8) -> Vec<Box<dyn AvatarEncoder>> {
    formats
        .iter()
        .map(|format| -> Box<dyn AvatarEncoder> {
            match format {
                OutputFormat::Webp => Box::new(WebpEncoder::new(quality)),
                OutputFormat::Jpeg => Box::new(JpegEncoder::new(quality)),
            }
        })
        .collect()
}
