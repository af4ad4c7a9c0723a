//! Watch decorator for the bundler collaborator.
//!
//! Wraps a bundle's source directories in a filesystem watcher and exposes
//! the raw change events over an async channel. The "Watcher-First" pattern
//! applies: the watcher is created before the initial build so edits made
//! during it are buffered, not lost.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Filesystem watch subscription for one bundle's sources.
pub struct BundleWatcher {
    /// Channel receiving notify events (sync side)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
}

impl BundleWatcher {
    /// Attach to the given roots, recursively.
    ///
    /// Missing roots are skipped with a log line; at least one root must
    /// exist.
    pub fn new(roots: &[PathBuf]) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut attached = 0usize;
        for root in roots {
            if !root.exists() {
                crate::log!("watch"; "skipping missing watch root {}", root.display());
                continue;
            }
            watcher.watch(root, RecursiveMode::Recursive)?;
            attached += 1;
        }

        if attached == 0 {
            return Err(notify::Error::generic("no watch roots exist"));
        }

        Ok(Self { notify_rx, watcher })
    }

    /// Bridge to async: spawns a thread that owns the watcher and forwards
    /// relevant events. Dropping the returned receiver tears the watcher
    /// down (the thread exits on the first failed send).
    pub fn into_event_stream(self) -> mpsc::Receiver<notify::Event> {
        let (tx, rx) = mpsc::channel(64);

        std::thread::spawn(move || {
            // Keeps the subscription alive for the thread's lifetime
            let _watcher = self.watcher;
            while let Ok(result) = self.notify_rx.recv() {
                match result {
                    Ok(event) if is_relevant(&event) => {
                        if tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        rx
    }
}

/// Filter notify noise before it reaches the debouncer.
pub fn is_relevant(event: &notify::Event) -> bool {
    use notify::EventKind;

    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(modify) => {
            // Ignore metadata-only changes (mtime/atime/chmod noise)
            // may trigger endless rebuild loops
            if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                return false;
            }
        }
        _ => return false,
    }

    event.paths.iter().any(|path| !is_temp_file(path))
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
