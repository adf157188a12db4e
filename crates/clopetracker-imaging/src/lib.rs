//! Clopetracker-Imaging: avatar normalization.
//!
//! Turns an arbitrary uploaded raster image into the canonical avatar
//! representation: upright, RGB, center-cropped to a square, resized to a
//! fixed resolution and re-encoded without any metadata.
//!
//! # Modules
//!
//! - `normalizer` - The decode → orient → crop → resize → encode pipeline
//! - `encoder` - Output formats and the ordered encoder fallback chain
//! - `orientation` - EXIF orientation lookup and pixel transforms
//! - `error` - Error types
//!
//! # Example
//!
//! ```no_run
//! use clopetracker_imaging::{NormalizeSettings, Normalizer};
//!
//! let normalizer = Normalizer::new(NormalizeSettings::default());
//! let bytes = std::fs::read("selfie.jpg").unwrap();
//! let avatar = normalizer.normalize(&bytes, "selfie.jpg").unwrap();
//! assert_eq!((avatar.width, avatar.height), (512, 512));
//! println!("{} ({}, {} bytes)", avatar.filename, avatar.content_type, avatar.len());
//! ```

pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod orientation;

pub use encoder::{AvatarEncoder, JpegEncoder, OutputFormat, WebpEncoder};
pub use error::{ImagingError, Result};
pub use normalizer::{NormalizeSettings, NormalizedImage, Normalizer};
