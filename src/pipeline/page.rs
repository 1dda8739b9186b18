//! Per-image transformation: one JPEG/PNG → one single-page PDF, in memory.
//!
//! The image is decoded (which also validates it), re-encoded as JPEG and
//! embedded as a `DCTDecode` image XObject painted over the whole page. The
//! page's MediaBox is the pixel size scaled to points at the fidelity DPI,
//! so fidelity changes the physical page size and never resamples pixels.
//! Grayscale sources stay grayscale, which keeps scanned manga pages small.
//! Transparent pixels are composited onto white, since JPEG has no alpha.

use crate::config::Fidelity;
use crate::error::PageError;
use crate::pipeline::input::Item;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, Luma, LumaA, Rgb, RgbImage, Rgba};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Resource name of the page image inside the page's XObject dictionary.
const IMAGE_NAME: &[u8] = b"Im0";

/// A transformed image: a complete single-page PDF plus where it belongs.
#[derive(Debug, Clone)]
pub struct PageArtifact {
    /// Position in the ordered item list (0-based).
    pub index: usize,
    pub name: String,
    /// Page size in PDF points.
    pub width_pt: f32,
    pub height_pt: f32,
    /// Serialized single-page PDF.
    pub pdf: Vec<u8>,
}

/// Page size in points for an image of `width_px` × `height_px` at `fidelity`.
pub fn page_size_pt(width_px: u32, height_px: u32, fidelity: Fidelity) -> (f32, f32) {
    let scale = POINTS_PER_INCH / fidelity.dpi() as f32;
    (width_px as f32 * scale, height_px as f32 * scale)
}

/// Transform one item into a single-page PDF.
///
/// CPU-bound: the pipeline calls this from `spawn_blocking`.
pub fn transform_item(
    index: usize,
    item: Item,
    fidelity: Fidelity,
    jpeg_quality: u8,
) -> Result<PageArtifact, PageError> {
    let (name, bytes) = item.into_bytes(index)?;

    let img = image::load_from_memory(&bytes).map_err(|e| PageError::DecodeFailed {
        index,
        name: name.clone(),
        detail: e.to_string(),
    })?;
    drop(bytes);

    let (width_px, height_px) = (img.width(), img.height());
    let (width_pt, height_pt) = page_size_pt(width_px, height_px, fidelity);

    let pdf = encode_single_page(img, width_pt, height_pt, jpeg_quality).map_err(|detail| {
        PageError::EncodeFailed {
            index,
            name: name.clone(),
            detail,
        }
    })?;

    debug!(
        "Image #{} '{}' {}x{} px → {:.1}x{:.1} pt, {} bytes",
        index,
        name,
        width_px,
        height_px,
        width_pt,
        height_pt,
        pdf.len()
    );

    Ok(PageArtifact {
        index,
        name,
        width_pt,
        height_pt,
        pdf,
    })
}

/// Drop alpha by blending onto white; keep grayscale as one channel.
fn flatten(img: DynamicImage) -> (DynamicImage, &'static str) {
    let color = img.color();
    match (color.has_color(), color.has_alpha()) {
        (true, false) => (DynamicImage::ImageRgb8(img.into_rgb8()), "DeviceRGB"),
        (false, false) => (DynamicImage::ImageLuma8(img.into_luma8()), "DeviceGray"),
        (true, true) => {
            let rgba = img.into_rgba8();
            let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
                Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
            });
            (DynamicImage::ImageRgb8(rgb), "DeviceRGB")
        }
        (false, true) => {
            let la = img.into_luma_alpha8();
            let gray = GrayImage::from_fn(la.width(), la.height(), |x, y| {
                let LumaA([l, a]) = *la.get_pixel(x, y);
                Luma([over_white(l, a)])
            });
            (DynamicImage::ImageLuma8(gray), "DeviceGray")
        }
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Build and serialize a one-page PDF showing `img` at the given page size.
fn encode_single_page(
    img: DynamicImage,
    width_pt: f32,
    height_pt: f32,
    jpeg_quality: u8,
) -> Result<Vec<u8>, String> {
    let (width_px, height_px) = (img.width(), img.height());
    let (pixels, color_space) = flatten(img);

    let mut jpeg = Vec::new();
    pixels
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality))
        .map_err(|e| format!("JPEG encoding failed: {e}"))?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width_px as i64),
            "Height" => Object::Integer(height_px as i64),
            "ColorSpace" => color_space,
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    // Scale the unit square to the full page, then paint the image.
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width_pt),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(height_pt),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| format!("content stream encoding failed: {e}"))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width_pt),
            Object::Real(height_pt),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| format!("PDF serialization failed: {e}"))?;
    Ok(out)
}
