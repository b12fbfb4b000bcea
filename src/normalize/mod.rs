//! Format normalization.
//!
//! Raster images (JPEG, PNG, GIF, WebP, BMP, TIFF) become single-page PDFs;
//! everything else passes through untouched with an extension derived from
//! the filename hint, the media type, or the configured default.
//!
//! A failed conversion is not an error for the run: the original bytes are
//! kept and a warning is logged.

mod error;
mod media;
pub mod pdf;

pub use error::ConversionError;
pub use media::{RasterFormat, detect_raster, extension_for_media_type};
pub use pdf::{PageOrientation, PdfPage, image_to_pdf};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::fetch::FetchedAsset;
use crate::naming::{extension_of, sanitize_extension};

/// Extension used when nothing better is known.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Normalization settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizePolicy {
    /// Convert raster images to PDF.
    pub convert_images: bool,
    /// Extension for pass-through assets with no usable hint or media type.
    pub default_extension: String,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            convert_images: true,
            default_extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl NormalizePolicy {
    /// Enables or disables image conversion.
    #[must_use]
    pub fn with_convert_images(mut self, convert_images: bool) -> Self {
        self.convert_images = convert_images;
        self
    }

    /// Sets the fallback extension; invalid values keep `bin`.
    #[must_use]
    pub fn with_default_extension(mut self, extension: &str) -> Self {
        self.default_extension =
            sanitize_extension(extension).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        self
    }
}

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAsset {
    /// Bytes to place in the archive.
    pub bytes: Vec<u8>,
    /// Extension without the dot.
    pub extension: String,
    /// True when the bytes are a PDF produced from an image.
    pub converted: bool,
    /// Filename announced by the server, carried for naming.
    pub filename_hint: Option<String>,
}

/// Applies a [`NormalizePolicy`] to fetched assets.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: NormalizePolicy,
}

impl Normalizer {
    /// Creates a normalizer.
    #[must_use]
    pub fn new(policy: NormalizePolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> &NormalizePolicy {
        &self.policy
    }

    /// Returns the raster format that would be converted, if any.
    #[must_use]
    pub fn conversion_target(&self, asset: &FetchedAsset) -> Option<RasterFormat> {
        if !self.policy.convert_images {
            return None;
        }
        detect_raster(asset.media_type.as_deref(), asset.filename_hint.as_deref())
    }

    /// Normalizes one asset; image decoding runs on the blocking pool.
    pub async fn normalize(&self, asset: FetchedAsset) -> NormalizedAsset {
        let Some(format) = self.conversion_target(&asset) else {
            return self.pass_through(asset);
        };

        let shared = Arc::new(asset.bytes);
        let worker = Arc::clone(&shared);
        let outcome = tokio::task::spawn_blocking(move || image_to_pdf(&worker, format))
            .await
            .unwrap_or_else(|e| Err(ConversionError::Worker(e.to_string())));

        match outcome {
            Ok(page) => {
                debug!(
                    width = page.width,
                    height = page.height,
                    orientation = ?page.orientation,
                    "image converted to PDF"
                );
                NormalizedAsset {
                    bytes: page.bytes,
                    extension: "pdf".to_string(),
                    converted: true,
                    filename_hint: asset.filename_hint,
                }
            }
            Err(error) => {
                warn!(error = %error, format = ?format, "image conversion failed, keeping original");
                let bytes = Arc::try_unwrap(shared).unwrap_or_else(|still_shared| (*still_shared).clone());
                self.pass_through(FetchedAsset { bytes, ..asset })
            }
        }
    }

    /// Normalizes synchronously, converting on the current thread.
    #[must_use]
    pub fn normalize_blocking(&self, asset: FetchedAsset) -> NormalizedAsset {
        let Some(format) = self.conversion_target(&asset) else {
            return self.pass_through(asset);
        };
        match image_to_pdf(&asset.bytes, format) {
            Ok(page) => NormalizedAsset {
                bytes: page.bytes,
                extension: "pdf".to_string(),
                converted: true,
                filename_hint: asset.filename_hint,
            },
            Err(error) => {
                warn!(error = %error, format = ?format, "image conversion failed, keeping original");
                self.pass_through(asset)
            }
        }
    }

    fn pass_through(&self, asset: FetchedAsset) -> NormalizedAsset {
        let extension = self.pass_through_extension(&asset);
        NormalizedAsset {
            bytes: asset.bytes,
            extension,
            converted: false,
            filename_hint: asset.filename_hint,
        }
    }

    /// Hint extension, else media-type table, else the default extension.
    fn pass_through_extension(&self, asset: &FetchedAsset) -> String {
        asset
            .filename_hint
            .as_deref()
            .and_then(extension_of)
            .or_else(|| {
                asset
                    .media_type
                    .as_deref()
                    .and_then(extension_for_media_type)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| self.policy.default_extension.clone())
    }
}
