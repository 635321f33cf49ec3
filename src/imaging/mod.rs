//! Image normalization, content addressing, and variant rendering — pure
//! Rust through the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode (JPEG, PNG)** | `image` crate, format guessed from bytes |
//! | **Orientation** | `ImageDecoder::orientation` + `apply_orientation` |
//! | **Resize / crop** | `imageops::resize` (Lanczos3) + `crop_imm` |
//! | **Encode** | `image::codecs::png::PngEncoder` |
//! | **Addressing** | `sha2` + base64url (unpadded) |
//!
//! The module is split into:
//! - **Calculations**: pure functions for dimension math (unit testable)
//! - **Normalize**: source bytes → [`CanonicalImage`]
//! - **Address**: [`CanonicalImage`] → content id
//! - **Operations**: pixel work for canonical and variant files

pub mod address;
mod calculations;
pub mod normalize;
pub mod operations;

pub use address::content_id;
pub use calculations::{
    center_square, clamp_requested, fit_within, resolve_crop_size, resolve_scaled_size,
};
pub use normalize::{CanonicalFormat, CanonicalImage, DecodeError, MAX_DIMENSION, normalize};
pub use operations::{ProcessingError, encode_canonical, render_variant};
