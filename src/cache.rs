//! The image cache: construction, ingest, and variant retrieval.
//!
//! [`ImageCache`] owns everything: the metadata store, the cache directory,
//! and (optionally) the watcher thread. It is the single object injected
//! into the serving layer — there is no global state.
//!
//! # Lifecycle
//!
//! `ImageCache::open` scans the source directory once through the
//! normalizer/addresser, registering every readable image. If watching is
//! enabled the watcher thread takes over from there; no full rescan ever
//! happens again. `shutdown` (or drop) stops the watcher via an explicit
//! signal and joins the thread.
//!
//! # Consistency model
//!
//! A variant request snapshots the id's metadata under the store lock, then
//! releases the lock for all file and codec I/O. Metadata is therefore
//! "as of request start": a file deleted concurrently with a request may
//! still be served once from its (never-deleted) canonical file. The cache
//! directory itself is append-only — delete events remove metadata but
//! leave canonical and variant files behind as an artifact store.
//!
//! # Concurrent generation
//!
//! Variant generation is not deduplicated: two callers missing the cache
//! simultaneously both render and both write. This is safe because the
//! output bytes are deterministic for (id, w, h, crop) and each write is an
//! atomic full-file replace (temp file + rename), so the last writer lands
//! identical content and no reader ever observes a partial file.

use crate::imaging::{
    self, CanonicalFormat, DecodeError, ProcessingError, clamp_requested, resolve_crop_size,
    resolve_scaled_size,
};
use crate::naming;
use crate::scan;
use crate::store::{EmptyStoreError, ImageMetadata, MetadataStore};
use crate::watcher::{self, WatcherHandle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Construction parameters for an [`ImageCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory of source images, scanned at startup and watched afterwards.
    pub image_dir: PathBuf,
    /// Directory for canonical and variant files. Created if missing.
    pub cache_dir: PathBuf,
    /// Whether to spawn the directory watcher.
    pub watch: bool,
}

/// Request-level failures surfaced to callers.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The requested id is not in the metadata store.
    #[error("unknown image id '{0}'")]
    UnknownId(String),
    /// The store has an id whose canonical file is gone — store and cache
    /// directory are out of sync. Indicates a bug; logged loudly.
    #[error("canonical file missing for id '{id}' (expected at {})", path.display())]
    MissingCanonical { id: String, path: PathBuf },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    #[error(transparent)]
    EmptyStore(#[from] EmptyStoreError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Filesystem watcher could not be initialized.
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Shared state behind the public cache: everything the scan, the watcher,
/// and request handlers all touch.
pub(crate) struct CacheCore {
    pub(crate) image_dir: PathBuf,
    pub(crate) cache_dir: PathBuf,
    pub(crate) store: MetadataStore,
}

impl CacheCore {
    /// Ingest one source file: read, normalize, address, write the
    /// canonical file if absent, register. The shared per-item path for the
    /// startup scan and watcher add events — both treat any error here as
    /// "skip this file", never "abort".
    pub(crate) fn ingest_file(&self, path: &Path) -> Result<String, CacheError> {
        let raw = fs::read(path)?;
        let canonical = imaging::normalize(&raw)?;
        let id = imaging::content_id(&canonical);

        let metadata = ImageMetadata::new(
            canonical.width(),
            canonical.height(),
            CanonicalFormat::Png,
        );

        let canonical_path = self.cache_dir.join(naming::cache_filename(
            &id,
            canonical.width(),
            canonical.height(),
            metadata.format,
        ));
        // Canonical files are immutable after first write; identical content
        // from another filename reuses the existing file.
        if !canonical_path.is_file() {
            let encoded = imaging::encode_canonical(&canonical)?;
            write_atomic(&self.cache_dir, &canonical_path, &encoded)?;
        }

        let filename = source_filename(path);
        self.store.register(&filename, &id, metadata);
        tracing::debug!(id, filename, "registered source image");
        Ok(id)
    }

    /// Resolve (and lazily generate) a variant file. See [`ImageCache::get_or_create_variant`].
    fn get_or_create_variant(
        &self,
        id: &str,
        width: Option<u32>,
        height: Option<u32>,
        crop: bool,
    ) -> Result<PathBuf, CacheError> {
        // Metadata as of request start; the lock is released before any I/O.
        let metadata = self
            .store
            .get_metadata(id)
            .ok_or_else(|| CacheError::UnknownId(id.to_string()))?;
        let original = metadata.original_dimensions();

        let width = clamp_requested(width, original.0);
        let height = clamp_requested(height, original.1);
        let (w, h) = if crop {
            resolve_crop_size(original, width, height)
        } else {
            resolve_scaled_size(original, width, height)
        };

        let variant_path = self
            .cache_dir
            .join(naming::cache_filename(id, w, h, metadata.format));
        // The mapping (id, w, h, crop) -> bytes is pure and the canonical
        // source immutable, so an existing file is always current.
        if variant_path.is_file() {
            return Ok(variant_path);
        }

        let canonical_path = self.cache_dir.join(naming::cache_filename(
            id,
            original.0,
            original.1,
            metadata.format,
        ));
        if !canonical_path.is_file() {
            tracing::error!(
                id,
                path = %canonical_path.display(),
                "canonical file missing: metadata store and cache directory are out of sync"
            );
            return Err(CacheError::MissingCanonical {
                id: id.to_string(),
                path: canonical_path,
            });
        }

        let encoded = imaging::render_variant(&canonical_path, (w, h), crop)?;
        write_atomic(&self.cache_dir, &variant_path, &encoded)?;
        tracing::debug!(id, width = w, height = h, crop, "generated variant");
        Ok(variant_path)
    }
}

/// Content-addressed image cache over a source directory.
///
/// Cheap to share: hand out `&ImageCache` (it is `Sync`) or wrap in an
/// `Arc` for the serving layer.
pub struct ImageCache {
    core: Arc<CacheCore>,
    watcher: Option<WatcherHandle>,
}

impl ImageCache {
    /// Open a cache: create the cache directory, run the one-time startup
    /// scan, and (if configured) start the directory watcher.
    ///
    /// Per-file decode failures during the scan are logged and skipped; an
    /// unreadable source *directory* is an error.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.cache_dir)?;

        let core = Arc::new(CacheCore {
            image_dir: config.image_dir,
            cache_dir: config.cache_dir,
            store: MetadataStore::new(),
        });

        let started = Instant::now();
        let stats = scan::populate(&core)?;
        tracing::info!(
            registered = stats.registered,
            skipped = stats.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            image_dir = %core.image_dir.display(),
            cache_dir = %core.cache_dir.display(),
            "image cache ready"
        );

        let watcher = if config.watch {
            Some(watcher::spawn(Arc::clone(&core))?)
        } else {
            None
        };

        Ok(Self { core, watcher })
    }

    pub fn get_metadata(&self, id: &str) -> Option<ImageMetadata> {
        self.core.store.get_metadata(id)
    }

    pub fn id_exists(&self, id: &str) -> bool {
        self.core.store.id_exists(id)
    }

    pub fn random_id(&self) -> Result<String, EmptyStoreError> {
        self.core.store.random_id()
    }

    pub fn random_entry(&self) -> Result<(String, ImageMetadata), EmptyStoreError> {
        self.core.store.random_entry()
    }

    pub fn first_id(&self) -> Result<String, EmptyStoreError> {
        self.core.store.first_id()
    }

    /// Number of distinct images currently registered.
    pub fn len(&self) -> usize {
        self.core.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.store.is_empty()
    }

    /// Return the path of a variant matching the request, generating it on
    /// first use.
    ///
    /// Dimensions are clamped to the original (no upscaling). Without
    /// `crop`, a single given dimension derives the other from the original
    /// aspect ratio and no dimensions at all means the canonical file
    /// itself. With `crop`, the canonical image is first center-cropped to
    /// a square of side `min(ow, oh)`, then scaled to the target.
    ///
    /// The returned file is guaranteed fully written.
    pub fn get_or_create_variant(
        &self,
        id: &str,
        width: Option<u32>,
        height: Option<u32>,
        crop: bool,
    ) -> Result<PathBuf, CacheError> {
        self.core.get_or_create_variant(id, width, height, crop)
    }

    /// Stop the watcher (if running) and join its thread. Dropping the
    /// cache does the same; this form just makes the point explicit.
    pub fn shutdown(mut self) {
        self.watcher.take();
    }
}

/// Source filename as stored in the filename → id map: the final path
/// component, lossily decoded.
pub(crate) fn source_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write `bytes` to `path` as a full-file replace: temp file in the same
/// directory, then an atomic rename. Concurrent writers of the same
/// deterministic content race harmlessly — the survivor is byte-identical.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
