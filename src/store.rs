//! In-memory metadata store: the only shared mutable state in the system.
//!
//! Two maps live behind a single mutex:
//!
//! - `id → ImageMetadata` — what callers query to serve an image
//! - `source filename → id` — what lets a watcher delete event find the id
//!   to drop without re-reading the (now gone) file
//!
//! The lock is held only for the duration of the map access, never across
//! file or codec I/O. Readers get clones out; a metadata value is therefore
//! a snapshot "as of request start" — a concurrent unregister for the same
//! id is an accepted race, not corrected (see `ImageCache` docs).
//!
//! ## Unregister policy
//!
//! `unregister` removes the id's metadata unconditionally on the first
//! matching filename. This is not reference counting: if two distinct
//! source files normalize to identical content (one content id), deleting
//! either hides the id. Ids are content-derived, so in practice each id has
//! a single producing file; the simplification is deliberate and matches
//! the reference behavior.

use crate::imaging::CanonicalFormat;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Raised when a random or first id is requested from an empty store.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("the metadata store is empty")]
pub struct EmptyStoreError;

/// Immutable description of a cached image.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImageMetadata {
    pub original_width: u32,
    pub original_height: u32,
    pub format: CanonicalFormat,
    pub media_type: String,
}

impl ImageMetadata {
    pub fn new(original_width: u32, original_height: u32, format: CanonicalFormat) -> Self {
        Self {
            original_width,
            original_height,
            format,
            media_type: format.media_type().to_string(),
        }
    }

    /// Original dimensions as a pair, the shape most math helpers take.
    pub fn original_dimensions(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }
}

#[derive(Debug, Default)]
struct StoreMaps {
    by_id: HashMap<String, ImageMetadata>,
    id_by_filename: HashMap<String, String>,
}

/// Owned, lock-guarded store. Construct one per cache instance and share it
/// by reference — there is no process-wide singleton.
#[derive(Debug, Default)]
pub struct MetadataStore {
    maps: Mutex<StoreMaps>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert into both maps. A prior mapping for `filename` is overwritten;
    /// its old id's metadata is left in place (the id may still be valid
    /// under another filename, and orphaned metadata for a re-ingested file
    /// converges on the next delete event).
    pub fn register(&self, filename: &str, id: &str, metadata: ImageMetadata) {
        let mut maps = self.lock();
        maps.by_id.insert(id.to_string(), metadata);
        maps.id_by_filename
            .insert(filename.to_string(), id.to_string());
    }

    /// Remove the filename mapping and its id's metadata (see module docs
    /// for the no-refcounting policy). Returns the removed id, or `None` if
    /// the filename was never registered (a no-op).
    pub fn unregister(&self, filename: &str) -> Option<String> {
        let mut maps = self.lock();
        let id = maps.id_by_filename.remove(filename)?;
        maps.by_id.remove(&id);
        Some(id)
    }

    pub fn get_metadata(&self, id: &str) -> Option<ImageMetadata> {
        self.lock().by_id.get(id).cloned()
    }

    pub fn id_exists(&self, id: &str) -> bool {
        self.lock().by_id.contains_key(id)
    }

    /// Uniformly random id over the current entries.
    pub fn random_id(&self) -> Result<String, EmptyStoreError> {
        let maps = self.lock();
        if maps.by_id.is_empty() {
            return Err(EmptyStoreError);
        }
        let index = rand::thread_rng().gen_range(0..maps.by_id.len());
        let id = maps
            .by_id
            .keys()
            .nth(index)
            .expect("index taken from len under the same lock");
        Ok(id.clone())
    }

    /// Uniformly random `(id, metadata)` pair.
    pub fn random_entry(&self) -> Result<(String, ImageMetadata), EmptyStoreError> {
        let maps = self.lock();
        if maps.by_id.is_empty() {
            return Err(EmptyStoreError);
        }
        let index = rand::thread_rng().gen_range(0..maps.by_id.len());
        let (id, metadata) = maps
            .by_id
            .iter()
            .nth(index)
            .expect("index taken from len under the same lock");
        Ok((id.clone(), metadata.clone()))
    }

    /// Lexicographically smallest id — a stable deterministic default when
    /// no id is requested.
    pub fn first_id(&self) -> Result<String, EmptyStoreError> {
        self.lock().by_id.keys().min().cloned().ok_or(EmptyStoreError)
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().by_id.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreMaps> {
        self.maps.lock().expect("metadata store lock poisoned")
    }
}
