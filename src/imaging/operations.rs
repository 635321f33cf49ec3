//! Pixel work for canonical and variant files.
//!
//! These functions combine the pure math in
//! [`calculations`](super::calculations) with the `image` crate: Lanczos3
//! resampling, centered square crops, and PNG encoding. Callers decide the
//! target geometry; nothing here touches the metadata store.

use super::calculations::center_square;
use super::normalize::CanonicalImage;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::path::Path;
use thiserror::Error;

/// Scaling or encoding failure on an otherwise valid image.
///
/// Recoverable for the single request that triggered it.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("image codec failure: {0}")]
    Codec(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a canonical image as PNG, ready to be written to the cache.
pub fn encode_canonical(image: &CanonicalImage) -> Result<Vec<u8>, ProcessingError> {
    encode_png(image.pixels())
}

/// Produce the PNG bytes of a variant from a canonical file on disk.
///
/// With `crop` set, the centered square (side `min(w, h)`) is taken before
/// scaling; otherwise the whole image is scaled. `target` is the exact
/// output size — the caller has already resolved aspect and clamping, and
/// the result's dimensions must match the variant filename bit-exactly.
pub fn render_variant(
    canonical_path: &Path,
    target: (u32, u32),
    crop: bool,
) -> Result<Vec<u8>, ProcessingError> {
    let pixels = image::open(canonical_path)?.into_rgb8();

    let pixels = if crop {
        let (x, y, side) = center_square(pixels.dimensions());
        image::imageops::crop_imm(&pixels, x, y, side, side).to_image()
    } else {
        pixels
    };

    let (w, h) = target;
    let pixels = if pixels.dimensions() == target {
        pixels
    } else {
        image::imageops::resize(&pixels, w, h, FilterType::Lanczos3)
    };

    encode_png(&pixels)
}

fn encode_png(pixels: &RgbImage) -> Result<Vec<u8>, ProcessingError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        pixels.as_raw(),
        pixels.width(),
        pixels.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}
