//! Error types for clopetracker-imaging.

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Errors that can occur while normalizing an avatar.
#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    /// The input could not be decoded as a raster image.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// Every configured encoder failed.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl ImagingError {
    /// Create an unsupported image error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedImage(message.into())
    }

    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }
}

impl From<image::ImageError> for ImagingError {
    fn from(e: image::ImageError) -> Self {
        Self::UnsupportedImage(e.to_string())
    }
}
