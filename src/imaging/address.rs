//! Content addressing for canonical images.
//!
//! An id is the URL-safe unpadded base64 encoding of SHA-256 over the byte
//! string `"{width}_{height}"` followed by the canonical image's raw RGB
//! pixel bytes. Two images with identical canonical pixel content and
//! dimensions always produce the same id, independent of original filename,
//! format, or encoding path. The dimension prefix keeps images whose pixel
//! buffers happen to coincide at different shapes from colliding.

use super::normalize::CanonicalImage;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Length of every id: base64 of a 32-byte digest, unpadded.
pub const ID_LENGTH: usize = 43;

/// Compute the content id of a canonical image. Never fails.
pub fn content_id(image: &CanonicalImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", image.width(), image.height()).as_bytes());
    hasher.update(image.raw_pixels());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
