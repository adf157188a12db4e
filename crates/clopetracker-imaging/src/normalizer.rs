//! The avatar normalization pipeline.
//!
//! Every step feeds the next:
//!
//! 1. decode (format sniffed from content, never from the file name)
//! 2. apply the EXIF orientation
//! 3. convert to RGB, dropping any alpha channel
//! 4. center-crop to a square
//! 5. resize to `target_size` × `target_size` with Lanczos3
//! 6. encode with the first encoder in the chain that succeeds
//!
//! Only pixels survive: EXIF, ICC profiles and comments are never re-attached.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::encoder::{encoders_for, AvatarEncoder, OutputFormat};
use crate::error::{ImagingError, Result};
use crate::orientation::{apply_orientation, read_exif_orientation};

/// Tunables for [`Normalizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeSettings {
    /// Edge length of the square output, in pixels.
    pub target_size: u32,
    /// Lossy quality on a 1–100 scale.
    pub quality: u8,
    /// Encoder preference order.
    pub formats: Vec<OutputFormat>,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            target_size: 512,
            quality: 85,
            formats: vec![OutputFormat::Webp, OutputFormat::Jpeg],
        }
    }
}

/// The canonical encoding of an uploaded avatar.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    /// Original stem with the extension of the format actually produced.
    pub filename: String,
    pub content_type: &'static str,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Pure image transform from raw upload bytes to a [`NormalizedImage`].
pub struct Normalizer {
    target_size: u32,
    encoders: Vec<Box<dyn AvatarEncoder>>,
}

impl Normalizer {
    /// Create a normalizer with the built-in encoders for `settings.formats`.
    pub fn new(settings: NormalizeSettings) -> Self {
        let encoders = encoders_for(&settings.formats, settings.quality);
        Self::with_encoders(settings.target_size, encoders)
    }

    /// Create a normalizer with an explicit encoder chain, tried in order.
    pub fn with_encoders(target_size: u32, encoders: Vec<Box<dyn AvatarEncoder>>) -> Self {
        Self {
            target_size,
            encoders,
        }
    }

    /// Normalize `input`, naming the result after `original_name`.
    ///
    /// Returns [`ImagingError::UnsupportedImage`] when the bytes do not decode
    /// to a non-empty raster image, and [`ImagingError::Encoding`] when every
    /// encoder in the chain failed.
    pub fn normalize(&self, input: &[u8], original_name: &str) -> Result<NormalizedImage> {
        let decoded = image::load_from_memory(input)?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(ImagingError::unsupported("image has no pixels"));
        }

        let upright = apply_orientation(decoded, read_exif_orientation(input));
        let rgb = upright.to_rgb8();
        let square = center_crop_square(&rgb);
        let resized = if square.dimensions() == (self.target_size, self.target_size) {
            square
        } else {
            imageops::resize(
                &square,
                self.target_size,
                self.target_size,
                FilterType::Lanczos3,
            )
        };

        let (bytes, format) = self.encode(&resized)?;

        tracing::debug!(
            original = original_name,
            format = %format,
            size = bytes.len(),
            "normalized avatar"
        );

        Ok(NormalizedImage {
            bytes,
            filename: output_filename(original_name, format),
            content_type: format.content_type(),
            format,
            width: resized.width(),
            height: resized.height(),
        })
    }

    fn encode(&self, img: &RgbImage) -> Result<(Vec<u8>, OutputFormat)> {
        let mut last_err = None;

        for encoder in &self.encoders {
            match encoder.encode(img) {
                Ok(bytes) => return Ok((bytes, encoder.format())),
                Err(e) => {
                    tracing::debug!(
                        format = %encoder.format(),
                        error = %e,
                        "encoder failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ImagingError::encoding("no encoder configured")))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizeSettings::default())
    }
}

/// Crop the largest centered square, truncating odd offsets toward the origin.
fn center_crop_square(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let side = width.min(height);
    let left = (width - side) / 2;
    let top = (height - side) / 2;
    imageops::crop_imm(img, left, top, side, side).to_image()
}

/// Swap the extension of `original_name` for the one of `format`.
fn output_filename(original_name: &str, format: OutputFormat) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("avatar");
    format!("{}.{}", stem, format.extension())
}
