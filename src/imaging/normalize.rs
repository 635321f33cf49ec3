//! Source image normalization into the canonical representation.
//!
//! Every image entering the cache passes through [`normalize`], which
//! produces the pixel data the content id is computed from and the bytes
//! the canonical file is written with. The canonical representation is:
//!
//! - RGB, 8 bits per channel, alpha dropped
//! - EXIF orientation applied, all other metadata discarded
//! - larger edge capped at [`MAX_DIMENSION`] (aspect preserved, Lanczos3)
//! - encoded as PNG on disk
//!
//! Two sources with identical pixel content normalize to identical bytes
//! regardless of filename, container format, or embedded metadata — that
//! is what makes the content id stable.

use super::calculations::fit_within;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Largest edge of a canonical image. Sources exceeding this are downscaled.
pub const MAX_DIMENSION: u32 = 2048;

/// Unreadable or corrupt source data.
///
/// Always recoverable for batch callers: the scan and the watcher log it
/// and skip the file, per-request callers surface it as a failure.
#[derive(Error, Debug)]
#[error("failed to decode image: {0}")]
pub struct DecodeError(#[from] image::ImageError);

/// The single on-disk encoding used for canonical and variant files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalFormat {
    Png,
}

impl CanonicalFormat {
    /// Lowercase file extension, exactly as it appears in cache filenames.
    pub const fn extension(self) -> &'static str {
        match self {
            CanonicalFormat::Png => "png",
        }
    }

    /// MIME type served alongside files of this format.
    pub const fn media_type(self) -> &'static str {
        match self {
            CanonicalFormat::Png => "image/png",
        }
    }
}

/// A normalized image: RGB pixels in display orientation, size-capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    pixels: RgbImage,
}

impl CanonicalImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Raw interleaved RGB bytes, the input to content addressing.
    pub fn raw_pixels(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub(crate) fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Normalize raw source bytes into the canonical representation.
///
/// Pure apart from the EXIF orientation correction: re-running on the same
/// bytes always yields the same pixels.
pub fn normalize(raw: &[u8]) -> Result<CanonicalImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let mut decoder = reader.into_decoder()?;

    // Read the stored orientation before decoding consumes the metadata.
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let decoded = DynamicImage::from_decoder(decoder)?;

    // RGB first (drops alpha), then rotate into display orientation.
    let mut img = DynamicImage::ImageRgb8(decoded.into_rgb8());
    img.apply_orientation(orientation);

    let (w, h) = (img.width(), img.height());
    let (target_w, target_h) = fit_within((w, h), MAX_DIMENSION);
    let pixels = if (target_w, target_h) == (w, h) {
        img.into_rgb8()
    } else {
        image::imageops::resize(&img.into_rgb8(), target_w, target_h, FilterType::Lanczos3)
    };

    Ok(CanonicalImage { pixels })
}
