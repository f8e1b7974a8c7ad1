//! File system watcher feeding the change queue

use std::path::{Path, PathBuf};

#[cfg(feature = "file-watcher")]
use notify::event::{ModifyKind, RenameMode};
#[cfg(feature = "file-watcher")]
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::error::{PipelineError, Result};
use crate::queue::{ChangeKind, ChangeQueue};

/// Watches asset directories and turns notify events into queue pushes
pub struct FileWatcher {
    #[cfg(feature = "file-watcher")]
    watcher: notify::RecommendedWatcher,
    #[cfg(feature = "file-watcher")]
    rx: crossbeam_channel::Receiver<notify::Result<Event>>,

    /// Watched directories
    watch_dirs: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher
    #[cfg(feature = "file-watcher")]
    pub fn new() -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            rx,
            watch_dirs: Vec::new(),
        })
    }

    /// Create a new file watcher (no-op without file-watcher feature)
    #[cfg(not(feature = "file-watcher"))]
    pub fn new() -> Result<Self> {
        Ok(Self { watch_dirs: Vec::new() })
    }

    /// Watch a directory recursively, creating it if missing
    #[cfg(feature = "file-watcher")]
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let path = dir.as_ref().to_path_buf();

        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        }

        self.watcher.watch(&path, RecursiveMode::Recursive)?;

        log::info!("Watching directory: {:?}", path);
        self.watch_dirs.push(path);
        Ok(())
    }

    /// Watch a directory (no-op without file-watcher feature)
    #[cfg(not(feature = "file-watcher"))]
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let path = dir.as_ref().to_path_buf();
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        }
        self.watch_dirs.push(path);
        Ok(())
    }

    /// Stop watching every directory
    #[cfg(feature = "file-watcher")]
    pub fn unwatch_all(&mut self) {
        for dir in self.watch_dirs.drain(..) {
            if let Err(e) = self.watcher.unwatch(&dir) {
                log::warn!("Failed to unwatch {:?}: {}", dir, e);
            }
        }
    }

    #[cfg(not(feature = "file-watcher"))]
    pub fn unwatch_all(&mut self) {
        self.watch_dirs.clear();
    }

    /// Drain pending notify events into `queue`; returns the number pushed
    #[cfg(feature = "file-watcher")]
    pub fn poll_into(&mut self, queue: &mut ChangeQueue) -> usize {
        let mut pushed = 0;

        while let Ok(result) = self.rx.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("File watcher error: {}", e);
                    continue;
                }
            };

            for (kind, path) in classify(&event) {
                // Skip directories and our own in-flight sidecar writes
                if path.is_dir() || is_temp_file(path) {
                    continue;
                }
                queue.push(kind, path.clone());
                pushed += 1;
            }
        }

        pushed
    }

    /// Poll (no-op without file-watcher feature)
    #[cfg(not(feature = "file-watcher"))]
    pub fn poll_into(&mut self, _queue: &mut ChangeQueue) -> usize {
        0
    }

    /// Get the list of watched directories
    pub fn watch_dirs(&self) -> &[PathBuf] {
        &self.watch_dirs
    }
}

/// Map one notify event to queue entries
#[cfg(feature = "file-watcher")]
fn classify(event: &Event) -> Vec<(ChangeKind, &PathBuf)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::RenamedOld,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::RenamedNew,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // Paths are [from, to]
            return event
                .paths
                .iter()
                .zip([ChangeKind::RenamedOld, ChangeKind::RenamedNew])
                .map(|(path, kind)| (kind, path))
                .collect();
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };
    event.paths.iter().map(|path| (kind, path)).collect()
}

fn is_temp_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
}
