//! Centralized cache filename convention and source extension matching.
//!
//! Every file in the cache directory — canonical images and variants alike —
//! follows the same pattern:
//!
//! ```text
//! {id}_{width}x{height}.{format}
//! ```
//!
//! The name is bit-exact: external tooling that inspects the cache directory
//! relies on it, so this module is the single place it is produced.
//! A canonical file is just the variant at the original dimensions.

use crate::imaging::CanonicalFormat;
use std::path::Path;

/// Source file extensions accepted by the scan and the watcher,
/// matched case-insensitively and by extension only (no content sniffing).
pub const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Whether a path looks like an acceptable source image.
pub fn is_accepted_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Cache filename for an id at the given dimensions.
pub fn cache_filename(id: &str, width: u32, height: u32, format: CanonicalFormat) -> String {
    format!("{id}_{width}x{height}.{}", format.extension())
}
