//! Media type and extension tables.

use image::ImageFormat;

use crate::naming::extension_of;

/// Raster formats the normalizer can turn into a PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// JPEG, embedded without re-encoding when possible.
    Jpeg,
    /// PNG.
    Png,
    /// GIF (first frame).
    Gif,
    /// WebP.
    WebP,
    /// Windows bitmap.
    Bmp,
    /// TIFF (first page).
    Tiff,
}

impl RasterFormat {
    /// Maps a lowercased media type without parameters.
    #[must_use]
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" | "image/x-png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/tiff" | "image/tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Maps a lowercased extension without the dot.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            "bmp" | "dib" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Decoder format for the `image` crate.
    #[must_use]
    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::WebP => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}

/// Decides whether an asset is a supported raster image.
///
/// The declared media type wins. When it is missing or generic
/// (`application/octet-stream`), the filename hint's extension decides.
#[must_use]
pub fn detect_raster(media_type: Option<&str>, filename_hint: Option<&str>) -> Option<RasterFormat> {
    match media_type {
        Some(declared) if !is_generic(declared) => RasterFormat::from_media_type(declared),
        _ => filename_hint
            .and_then(extension_of)
            .and_then(|ext| RasterFormat::from_extension(&ext)),
    }
}

/// Returns the usual extension (no dot) for a media type.
#[must_use]
pub fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    let ext = match media_type {
        "application/pdf" => "pdf",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" | "image/x-png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => "bmp",
        "image/tiff" | "image/tif" => "tiff",
        "image/svg+xml" => "svg",
        "image/heic" => "heic",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "text/html" => "html",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/zip" => "zip",
        "application/gzip" => "gz",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/vnd.oasis.opendocument.text" => "odt",
        "application/vnd.oasis.opendocument.spreadsheet" => "ods",
        "video/mp4" => "mp4",
        "audio/mpeg" => "mp3",
        _ => return None,
    };
    Some(ext)
}

fn is_generic(media_type: &str) -> bool {
    matches!(media_type, "application/octet-stream" | "binary/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_raster_prefers_declared_type() {
        assert_eq!(
            detect_raster(Some("image/png"), Some("scan.pdf")),
            Some(RasterFormat::Png)
        );
        assert_eq!(detect_raster(Some("application/pdf"), Some("scan.png")), None);
    }

    #[test]
    fn test_detect_raster_falls_back_to_hint_for_generic_type() {
        assert_eq!(
            detect_raster(Some("application/octet-stream"), Some("Photo.JPG")),
            Some(RasterFormat::Jpeg)
        );
        assert_eq!(detect_raster(None, Some("x.webp")), Some(RasterFormat::WebP));
        assert_eq!(detect_raster(None, Some("notes.txt")), None);
        assert_eq!(detect_raster(None, None), None);
    }

    #[test]
    fn test_extension_for_media_type() {
        assert_eq!(extension_for_media_type("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_media_type("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_media_type("application/x-unknown"), None);
    }
}
