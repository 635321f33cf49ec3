//! One-time startup population of the metadata store.
//!
//! Walks the source directory (flat, non-recursive), runs every accepted
//! file through the ingest path, and reports counts. Per-file failures —
//! unreadable files, corrupt image data — are logged and skipped so one bad
//! file never blocks startup; only an unreadable directory is fatal.

use crate::cache::{CacheCore, CacheError};
use crate::naming;
use std::fs;

/// Outcome counts for a startup scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanStats {
    pub registered: usize,
    pub skipped: usize,
}

/// Scan `core.image_dir` and ingest every accepted source file.
pub(crate) fn populate(core: &CacheCore) -> Result<ScanStats, CacheError> {
    let mut stats = ScanStats::default();

    for entry in fs::read_dir(&core.image_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                stats.skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() || !naming::is_accepted_source(&path) {
            continue;
        }

        match core.ingest_file(&path) {
            Ok(_) => stats.registered += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
