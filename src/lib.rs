//! # Picshelf
//!
//! A content-addressed image cache over a directory of source photos.
//! Drop JPEG or PNG files into a folder; picshelf normalizes each one to a
//! canonical form, derives a stable id from the pixels themselves, and
//! serves resized (optionally center-cropped) variants on demand, each
//! rendered at most once and reused from disk forever after.
//!
//! # Architecture: Normalize, Address, Serve
//!
//! ```text
//! 1. Normalize   source bytes  →  canonical RGB image   (orientation, cap, PNG)
//! 2. Address     canonical     →  content id            (SHA-256 over pixels)
//! 3. Serve       (id, w, h)    →  variant file          (lazy, cached on disk)
//! ```
//!
//! The id is derived from canonical pixel content, not from filenames or
//! raw bytes: the same photo saved as JPEG and PNG, or re-exported with
//! different EXIF metadata, lands on one id and one set of cached variants.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`cache`] | Public entry point — construction, ingest, lazy variant retrieval |
//! | [`imaging`] | Pure-Rust pixel work: normalization, addressing, resize/crop, PNG encoding |
//! | [`naming`] | The `{id}_{w}x{h}.png` cache filename convention and source extension filter |
//! | [`store`] | In-memory metadata maps behind one mutex — the only shared mutable state |
//! | `scan` | One-time startup population of the store |
//! | `watcher` | Keeps the store converged with the source directory via `notify` |
//!
//! # Design Decisions
//!
//! ## Content Addressing Over Path Addressing
//!
//! Ids are `base64url(SHA-256("{w}_{h}" ++ raw RGB bytes))` of the
//! *canonical* image — 43 URL-safe characters, no padding. Renames don't
//! invalidate anything, duplicate files deduplicate for free, and the
//! dimension prefix keeps differently-shaped images with coincidentally
//! equal pixel buffers apart.
//!
//! ## Canonical PNG
//!
//! Every source decodes to one canonical form: RGB8, EXIF orientation
//! applied, larger edge capped at [`imaging::MAX_DIMENSION`], encoded as
//! PNG. Variants render from the canonical file, never from the source, so
//! a request is one lossless decode plus one resample regardless of source
//! format — and the source file can disappear without breaking serving.
//!
//! ## Append-Only Cache Directory
//!
//! Cache files are written once via temp-file-and-rename and never deleted
//! or rewritten. Readers can hold open handles across any concurrent
//! activity; stale files are impossible because the mapping from
//! `(id, w, h, crop)` to bytes is pure.
//!
//! ## One Mutex, No Async
//!
//! The shared state is two small `HashMap`s behind a single `std::sync`
//! mutex, never held across I/O. File and codec work dominates latency, so
//! blocking threads are the simpler fit; the watcher is a plain thread
//! draining an mpsc channel.

pub mod cache;
pub mod imaging;
pub mod naming;
mod scan;
pub mod store;
mod watcher;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::{CacheConfig, CacheError, ImageCache};
pub use store::{EmptyStoreError, ImageMetadata, MetadataStore};
