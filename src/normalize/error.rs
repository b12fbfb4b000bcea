//! Conversion errors. Always recoverable: the caller keeps the original bytes.

use thiserror::Error;

/// Reasons an image could not be turned into a PDF.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The image data could not be decoded.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The decoded image has no pixels.
    #[error("image has zero width or height")]
    EmptyImage,

    /// The PDF document could not be built.
    #[error("PDF build failed: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Compression or serialization I/O failed.
    #[error("PDF write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking conversion task did not complete.
    #[error("conversion task failed: {0}")]
    Worker(String),
}
