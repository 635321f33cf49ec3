//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! They decide *what* size a canonical or variant image should be; the
//! pixel work happens in [`operations`](super::operations).

/// Clamp a requested dimension to the original: the cache never upscales
/// beyond the source image.
pub fn clamp_requested(requested: Option<u32>, original: u32) -> Option<u32> {
    requested.map(|v| v.min(original))
}

/// Resolve the target size for an aspect-preserving scale.
///
/// With only one dimension given, the other is derived from the original
/// aspect ratio (`aspect = ow / oh`): missing height is `round(w / aspect)`,
/// missing width is `round(h * aspect)`. With neither given the target is
/// the original size (identity). With both given they are used as-is —
/// callers that want proportional output pass only one.
///
/// Derived dimensions are floored at 1 so degenerate aspect ratios never
/// produce a zero-sized image.
pub fn resolve_scaled_size(
    original: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    let aspect = orig_w as f64 / orig_h as f64;

    match (width, height) {
        (None, None) => original,
        (Some(w), None) => (w, ((w as f64 / aspect).round() as u32).max(1)),
        (None, Some(h)) => (((h as f64 * aspect).round() as u32).max(1), h),
        (Some(w), Some(h)) => (w, h),
    }
}

/// Resolve the target size for a thumbnail (center-crop) request.
///
/// Thumbnails are square by convention: a missing dimension defaults to the
/// given one, and with neither given the target is the crop square itself,
/// so the request degrades to the centered crop at full resolution.
pub fn resolve_crop_size(
    original: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    let side = original.0.min(original.1);
    match (width, height) {
        (None, None) => (side, side),
        (Some(w), None) => (w, w),
        (None, Some(h)) => (h, h),
        (Some(w), Some(h)) => (w, h),
    }
}

/// Geometry of the centered square crop used in thumbnail mode.
///
/// Returns `(x, y, side)` where `side = min(width, height)` and the square
/// is centered on the longer axis (integer division biases half a pixel
/// toward the top/left).
pub fn center_square(dimensions: (u32, u32)) -> (u32, u32, u32) {
    let (w, h) = dimensions;
    let side = w.min(h);
    ((w - side) / 2, (h - side) / 2, side)
}

/// Downscale dimensions so the larger edge equals `max`, preserving aspect.
///
/// Dimensions already within the bound are returned unchanged. The scaled
/// short edge is rounded and floored at 1.
pub fn fit_within(dimensions: (u32, u32), max: u32) -> (u32, u32) {
    let (w, h) = dimensions;
    if w <= max && h <= max {
        return (w, h);
    }
    if w >= h {
        let scale = max as f64 / w as f64;
        (max, ((h as f64 * scale).round() as u32).max(1))
    } else {
        let scale = max as f64 / h as f64;
        (((w as f64 * scale).round() as u32).max(1), max)
    }
}
