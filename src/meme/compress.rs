//! Downsampling and lossy re-encoding of bitmaps before they enter history.

use crate::error::CompositionError;
use crate::meme::composite::Bitmap;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, RgbImage, RgbaImage};

/// Longest side of a stored history image.
pub const MAX_IMAGE_DIMENSION: u32 = 400;
/// JPEG quality, equivalent to canvas `toDataURL('image/jpeg', 0.7)`.
pub const JPEG_QUALITY: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

/// Dimensions after fitting the longest side into [`MAX_IMAGE_DIMENSION`].
/// Never upscales.
pub fn target_dimensions(width: u32, height: u32) -> (u32, u32) {
    let max = MAX_IMAGE_DIMENSION as f64;
    if width > height {
        if width > MAX_IMAGE_DIMENSION {
            let h = (height as f64 * max / width as f64).round() as u32;
            return (MAX_IMAGE_DIMENSION, h.max(1));
        }
    } else if height > MAX_IMAGE_DIMENSION {
        let w = (width as f64 * max / height as f64).round() as u32;
        return (w.max(1), MAX_IMAGE_DIMENSION);
    }
    (width, height)
}

pub fn compress_bitmap(bitmap: &Bitmap) -> Result<CompressedImage, CompositionError> {
    compress_rgba(bitmap.as_image())
}

/// Decode any supported encoded image and compress it.
pub fn compress_encoded(bytes: &[u8]) -> Result<CompressedImage, CompositionError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| CompositionError::Encode(format!("decode input bitmap: {e}")))?;
    compress_rgba(&decoded.to_rgba8())
}

pub fn compress_data_url(data_url: &str) -> Result<CompressedImage, CompositionError> {
    let (bytes, _mime) = decode_data_url(data_url).map_err(CompositionError::Encode)?;
    compress_encoded(&bytes)
}

fn compress_rgba(source: &RgbaImage) -> Result<CompressedImage, CompositionError> {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(CompositionError::InvalidSurface {
            width: src_w,
            height: src_h,
        });
    }

    let (width, height) = target_dimensions(src_w, src_h);
    let resized;
    let scaled = if (width, height) == (src_w, src_h) {
        source
    } else {
        resized = image::imageops::resize(source, width, height, FilterType::Triangle);
        &resized
    };

    let rgb = flatten_onto_black(scaled);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| CompositionError::Encode(e.to_string()))?;

    tracing::debug!(
        from = ?(src_w, src_h),
        to = ?(width, height),
        bytes = jpeg.len(),
        "compressed bitmap for history"
    );

    Ok(CompressedImage {
        width,
        height,
        data_url: format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(jpeg)
        ),
    })
}

/// JPEG has no alpha channel; transparent pixels export as black.
fn flatten_onto_black(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let scale = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        image::Rgb([scale(r), scale(g), scale(b)])
    })
}

/// Split a base64 `data:` URL into its bytes and mime type.
pub fn decode_data_url(data_url: &str) -> Result<(Vec<u8>, String), String> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URL".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URL has no payload".to_string())?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| "data URL is not base64 encoded".to_string())?;
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    Ok((bytes, mime.to_string()))
}
