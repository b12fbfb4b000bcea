//! Single-page PDF output for raster images.
//!
//! The page is exactly the size of the image, one point per pixel, so the
//! orientation follows the long edge. JPEG data in RGB or grayscale is
//! embedded untouched with `DCTDecode`; every other input is decoded,
//! flattened onto white and stored as zlib-compressed RGB (`FlateDecode`).

use std::io::{Cursor, Write};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, DynamicImage, ImageDecoder, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use super::ConversionError;
use super::media::RasterFormat;

/// Page orientation of a converted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrientation {
    /// Height greater than or equal to width.
    Portrait,
    /// Width greater than height.
    Landscape,
}

impl PageOrientation {
    /// Orientation for a page of `width` x `height`.
    #[must_use]
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// A converted document.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Serialized PDF.
    pub bytes: Vec<u8>,
    /// Page width in points.
    pub width: u32,
    /// Page height in points.
    pub height: u32,
    /// Derived orientation.
    pub orientation: PageOrientation,
}

struct EmbeddedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

/// Converts one raster image into a single-page PDF.
///
/// # Errors
///
/// Returns [`ConversionError`] when the image cannot be decoded or the
/// document cannot be serialized.
pub fn image_to_pdf(bytes: &[u8], format: RasterFormat) -> Result<PdfPage, ConversionError> {
    let embedded = match format {
        RasterFormat::Jpeg => match embed_jpeg(bytes)? {
            Some(embedded) => embedded,
            None => embed_decoded(image::load_from_memory_with_format(
                bytes,
                format.image_format(),
            )?)?,
        },
        other => embed_decoded(image::load_from_memory_with_format(
            bytes,
            other.image_format(),
        )?)?,
    };
    if embedded.width == 0 || embedded.height == 0 {
        return Err(ConversionError::EmptyImage);
    }

    let (width, height) = (embedded.width, embedded.height);
    let bytes = write_document(embedded)?;
    Ok(PdfPage {
        bytes,
        width,
        height,
        orientation: PageOrientation::for_dimensions(width, height),
    })
}

/// Returns the JPEG as-is when its colour model maps onto a PDF device space.
///
/// The scan data is decoded in full first, so a truncated or corrupt file
/// fails here instead of producing an unreadable page.
fn embed_jpeg(bytes: &[u8]) -> Result<Option<EmbeddedImage>, ConversionError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    let color_space = match (decoder.color_type(), jpeg_components(bytes)) {
        (ColorType::L8, Some(1)) => "DeviceGray",
        (ColorType::Rgb8, Some(3)) => "DeviceRGB",
        _ => return Ok(None),
    };
    let len = usize::try_from(decoder.total_bytes()).map_err(|_| ConversionError::EmptyImage)?;
    let mut pixels = vec![0; len];
    decoder.read_image(&mut pixels)?;

    Ok(Some(EmbeddedImage {
        width,
        height,
        color_space,
        filter: "DCTDecode",
        data: bytes.to_vec(),
    }))
}

fn embed_decoded(image: DynamicImage) -> Result<EmbeddedImage, ConversionError> {
    let rgb = flatten_on_white(image);
    let (width, height) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw())?;
    Ok(EmbeddedImage {
        width,
        height,
        color_space: "DeviceRGB",
        filter: "FlateDecode",
        data: encoder.finish()?,
    })
}

/// Composites transparent pixels over white.
fn flatten_on_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    for (target, source) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = u16::from(source[3]);
        for channel in 0..3 {
            let value = u16::from(source[channel]) * alpha + 255 * (255 - alpha);
            target[channel] = u8::try_from(value / 255).unwrap_or(u8::MAX);
        }
    }
    rgb
}

/// Reads the component count from the first start-of-frame segment.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            return bytes.get(pos + 9).copied();
        }
        pos += 2 + length;
    }
    None
}

fn write_document(image: EmbeddedImage) -> Result<Vec<u8>, ConversionError> {
    let width = i64::from(image.width);
    let height = i64::from(image.height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => image.color_space,
            "BitsPerComponent" => 8,
            "Filter" => image.filter,
        },
        image.data,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
