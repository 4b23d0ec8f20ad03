//! Image decoding through the `image` crate.

use std::path::Path;

use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::error::CoreError;

use super::{CpuImage, PixelFormat};

/// Dimensions and natural format of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Read the header of an image file without decoding its pixels.
pub fn probe(path: &Path) -> Result<ImageInfo, CoreError> {
    let decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let (width, height) = decoder.dimensions();
    Ok(ImageInfo {
        width,
        height,
        format: natural_format(decoder.color_type().has_alpha()),
    })
}

/// Decode an image file into its natural format (RGB or RGBA).
pub fn load(path: &Path) -> Result<CpuImage, CoreError> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(from_dynamic(decoded, None))
}

/// Decode an image file and convert it to `format`.
pub fn load_as(path: &Path, format: PixelFormat) -> Result<CpuImage, CoreError> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(from_dynamic(decoded, Some(format)))
}

/// Decode an in-memory encoded image.
pub fn load_from_memory(bytes: &[u8]) -> Result<CpuImage, CoreError> {
    Ok(from_dynamic(image::load_from_memory(bytes)?, None))
}

fn natural_format(has_alpha: bool) -> PixelFormat {
    if has_alpha {
        PixelFormat::Rgba8
    } else {
        PixelFormat::Rgb8
    }
}

fn from_dynamic(decoded: DynamicImage, format: Option<PixelFormat>) -> CpuImage {
    let (width, height) = (decoded.width(), decoded.height());
    let natural = natural_format(decoded.color().has_alpha());
    let raw = match natural {
        PixelFormat::Rgba8 => decoded.into_rgba8().into_raw(),
        _ => decoded.into_rgb8().into_raw(),
    };
    // The converted buffer always matches the reported size.
    let image = CpuImage::from_data(width, height, natural, raw)
        .unwrap_or_else(|_| CpuImage::new(width, height, natural));
    match format {
        Some(format) if format != natural => image.convert(format),
        _ => image,
    }
}
