use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Inputs above this size are passed through untouched.
    pub max_bytes: usize,
    /// Longest side after downscaling; `0` keeps the original size.
    pub max_dimension: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_dimension: 0,
        }
    }
}

impl ImageLimits {
    pub fn accepts(&self, len: usize) -> bool {
        self.max_bytes == 0 || len <= self.max_bytes
    }
}

/// Decoded input together with the format it should be written back in.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

pub fn decode(bytes: &[u8]) -> EngineResult<DecodedImage> {
    if bytes.is_empty() {
        return Err(EngineError::DecodeFailed("empty input".to_string()));
    }
    let detected = sniff_format(bytes);
    let image = match detected {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .map_err(|err| EngineError::DecodeFailed(err.to_string()))?;
    let format = detected
        .filter(|format| can_encode(*format))
        .unwrap_or(ImageFormat::Png);
    let (width, height) = image.dimensions();
    debug!(width, height, ?format, "decoded image");
    Ok(DecodedImage { image, format })
}

pub fn encode(image: &RgbaImage, format: ImageFormat) -> EngineResult<Vec<u8>> {
    let dynamic = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image.clone()).to_rgb8())
    } else {
        DynamicImage::ImageRgba8(image.clone())
    };
    let mut bytes = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|err| EngineError::EncodeFailed(err.to_string()))?;
    Ok(bytes)
}

/// Shrinks the image so its longest side is at most `max_dimension`.
pub fn downscale_if_needed(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    if max_dimension == 0 {
        return image;
    }
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }
    let ratio = (max_dimension as f32 / width as f32).min(max_dimension as f32 / height as f32);
    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);
    info!(
        width,
        height, new_width, new_height, "downscaling oversized image"
    );
    image.resize_exact(
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    )
}

pub fn mime_for_format(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}

fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    let kind = infer::get(bytes)?;
    let mime = kind.mime_type();
    if !mime.starts_with("image/") {
        return None;
    }
    image_format_from_mime(mime)
}

fn image_format_from_mime(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

fn can_encode(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Tiff
    )
}
