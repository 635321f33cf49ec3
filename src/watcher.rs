//! Directory watcher: keeps the metadata store converged with the source
//! directory after the startup scan.
//!
//! A `notify` watcher pushes raw filesystem events into an mpsc channel; a
//! dedicated thread drains the channel and applies events sequentially, so
//! the ingest path never runs concurrently with itself. Event
//! interpretation is a pure function ([`classify`]) over the `notify` event
//! kinds, unit-testable without touching the filesystem:
//!
//! - create / data-modify → re-ingest the file (idempotent: identical
//!   content maps to the same id and the canonical file already exists)
//! - remove / rename-away → unregister by source filename
//! - rename-into → ingest the new name
//!
//! There is no debouncing. Editors that write several events per save just
//! trigger several idempotent ingests; correctness does not depend on
//! event coalescing, ordering guarantees, or platform event flavor.
//!
//! Shutdown is explicit: [`WatcherHandle`] sends a shutdown message on drop
//! and joins the thread, so no events are processed after the cache is gone.

use crate::cache::{CacheCore, source_filename};
use crate::naming;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

/// What a filesystem event means for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WatchAction {
    /// (Re-)ingest this source file.
    Add(PathBuf),
    /// Drop the registration for this source path.
    Remove(PathBuf),
}

enum WatchMessage {
    Fs(notify::Result<Event>),
    Shutdown,
}

/// Running watcher thread. Dropping it stops the watcher and joins the
/// thread; pending events in the channel are discarded.
pub(crate) struct WatcherHandle {
    shutdown_tx: mpsc::Sender<WatchMessage>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        // Send failure means the thread already exited; join regardless.
        let _ = self.shutdown_tx.send(WatchMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start watching `core.image_dir` (non-recursively) and applying events.
pub(crate) fn spawn(core: Arc<CacheCore>) -> notify::Result<WatcherHandle> {
    let (tx, rx) = mpsc::channel();

    let event_tx = tx.clone();
    let mut watcher = notify::recommended_watcher(move |event| {
        // Receiver gone means shutdown already happened; nothing to do.
        let _ = event_tx.send(WatchMessage::Fs(event));
    })?;
    watcher.watch(&core.image_dir, RecursiveMode::NonRecursive)?;
    tracing::info!(dir = %core.image_dir.display(), "watching for source changes");

    let thread = thread::spawn(move || {
        // The watcher must live on this thread: dropping it stops the
        // event stream, which is exactly what shutdown wants.
        let _watcher = watcher;
        for message in rx {
            match message {
                WatchMessage::Fs(Ok(event)) => {
                    for action in classify(&event) {
                        apply(&core, action);
                    }
                }
                WatchMessage::Fs(Err(e)) => {
                    tracing::warn!(error = %e, "watcher error event");
                }
                WatchMessage::Shutdown => break,
            }
        }
    });

    Ok(WatcherHandle {
        shutdown_tx: tx,
        thread: Some(thread),
    })
}

/// Interpret a raw filesystem event as store actions. Paths that are not
/// accepted source files produce nothing.
pub(crate) fn classify(event: &Event) -> Vec<WatchAction> {
    let sources = || {
        event
            .paths
            .iter()
            .filter(|p| naming::is_accepted_source(p))
            .cloned()
    };

    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any) => sources().map(WatchAction::Add).collect(),

        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            sources().map(WatchAction::Remove).collect()
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            sources().map(WatchAction::Add).collect()
        }

        // Both paths in one event: old name first, new name last.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut actions = Vec::new();
            if let Some(from) = event.paths.first().filter(|p| naming::is_accepted_source(p)) {
                actions.push(WatchAction::Remove(from.clone()));
            }
            if event.paths.len() > 1 {
                if let Some(to) = event.paths.last().filter(|p| naming::is_accepted_source(p)) {
                    actions.push(WatchAction::Add(to.clone()));
                }
            }
            actions
        }

        // Platform didn't say which side of the rename this is; removing
        // then re-adding converges either way (the add is a no-op for a
        // path that no longer exists).
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => sources()
            .flat_map(|p| [WatchAction::Remove(p.clone()), WatchAction::Add(p)])
            .collect(),

        _ => Vec::new(),
    }
}

fn apply(core: &CacheCore, action: WatchAction) {
    match action {
        WatchAction::Add(path) => {
            // Events can outlive their file (rapid create+delete); skip
            // silently rather than logging a decode failure for nothing.
            if !path.is_file() {
                return;
            }
            if let Err(e) = core.ingest_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unprocessable file");
            }
        }
        WatchAction::Remove(path) => {
            let filename = source_filename(&path);
            match core.store.unregister(&filename) {
                Some(id) => tracing::debug!(filename, id, "unregistered source image"),
                None => tracing::debug!(filename, "remove event for unregistered file"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ImageCache};
    use crate::store::MetadataStore;
    use crate::test_helpers::{wait_for, write_png};
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut e = Event::new(kind);
        e.paths = paths.iter().map(PathBuf::from).collect();
        e
    }

    // =========================================================================
    // classify
    // =========================================================================

    #[test]
    fn create_maps_to_add() {
        let e = event(EventKind::Create(CreateKind::File), &["/tmp/a.png"]);
        assert_eq!(classify(&e), vec![WatchAction::Add(PathBuf::from("/tmp/a.png"))]);
    }

    #[test]
    fn data_modify_maps_to_add() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/tmp/a.jpg"],
        );
        assert_eq!(classify(&e), vec![WatchAction::Add(PathBuf::from("/tmp/a.jpg"))]);
    }

    #[test]
    fn remove_maps_to_remove() {
        let e = event(EventKind::Remove(RemoveKind::File), &["/tmp/a.png"]);
        assert_eq!(
            classify(&e),
            vec![WatchAction::Remove(PathBuf::from("/tmp/a.png"))]
        );
    }

    #[test]
    fn rename_from_removes_and_rename_to_adds() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/tmp/old.png"],
        );
        assert_eq!(
            classify(&from),
            vec![WatchAction::Remove(PathBuf::from("/tmp/old.png"))]
        );

        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/tmp/new.png"],
        );
        assert_eq!(
            classify(&to),
            vec![WatchAction::Add(PathBuf::from("/tmp/new.png"))]
        );
    }

    #[test]
    fn rename_both_removes_old_and_adds_new() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/tmp/old.png", "/tmp/new.png"],
        );
        assert_eq!(
            classify(&e),
            vec![
                WatchAction::Remove(PathBuf::from("/tmp/old.png")),
                WatchAction::Add(PathBuf::from("/tmp/new.png")),
            ]
        );
    }

    #[test]
    fn rename_both_into_unaccepted_extension_only_removes() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/tmp/old.png", "/tmp/new.txt"],
        );
        assert_eq!(
            classify(&e),
            vec![WatchAction::Remove(PathBuf::from("/tmp/old.png"))]
        );
    }

    #[test]
    fn non_source_paths_are_ignored() {
        let e = event(EventKind::Create(CreateKind::File), &["/tmp/notes.txt"]);
        assert!(classify(&e).is_empty());
    }

    #[test]
    fn access_events_are_ignored() {
        let e = event(
            EventKind::Access(notify::event::AccessKind::Read),
            &["/tmp/a.png"],
        );
        assert!(classify(&e).is_empty());
    }

    // =========================================================================
    // apply
    // =========================================================================

    #[test]
    fn apply_add_for_vanished_file_is_noop() {
        let images = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let core = CacheCore {
            image_dir: images.path().to_path_buf(),
            cache_dir: cache_dir.path().to_path_buf(),
            store: MetadataStore::new(),
        };

        apply(&core, WatchAction::Add(images.path().join("gone.png")));
        assert!(core.store.is_empty());
    }

    #[test]
    fn apply_remove_for_unknown_file_is_noop() {
        let images = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let core = CacheCore {
            image_dir: images.path().to_path_buf(),
            cache_dir: cache_dir.path().to_path_buf(),
            store: MetadataStore::new(),
        };

        apply(&core, WatchAction::Remove(images.path().join("never.png")));
        assert!(core.store.is_empty());
    }

    // =========================================================================
    // end to end
    // =========================================================================

    #[test]
    fn watcher_converges_on_create_and_delete() {
        let images = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache = ImageCache::open(CacheConfig {
            image_dir: images.path().to_path_buf(),
            cache_dir: cache_dir.path().to_path_buf(),
            watch: true,
        })
        .unwrap();
        assert!(cache.is_empty());

        let file = images.path().join("late.png");
        write_png(&file, 32, 24);
        assert!(
            wait_for(std::time::Duration::from_secs(10), || cache.len() == 1),
            "created file was never registered"
        );
        let id = cache.first_id().unwrap();
        assert_eq!(cache.get_metadata(&id).unwrap().original_dimensions(), (32, 24));

        std::fs::remove_file(&file).unwrap();
        assert!(
            wait_for(std::time::Duration::from_secs(10), || cache.is_empty()),
            "deleted file was never unregistered"
        );

        cache.shutdown();
    }
}
