//! Change coalescing queue
//!
//! Editors and file systems emit bursts of events for one save. Events for a
//! path that already has a recent queued entry are folded into it: the newest
//! kind wins and the entry keeps its place in the queue.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default coalescing window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Type of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    /// Old name of a renamed file
    RenamedOld,
    /// New name of a renamed file
    RenamedNew,
}

impl ChangeKind {
    /// Removal-like changes unload; the rest compile
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Removed | Self::RenamedOld)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::RenamedOld => "renamed (old)",
            Self::RenamedNew => "renamed (new)",
        };
        f.write_str(name)
    }
}

/// A file change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

struct QueuedChange {
    event: ChangeEvent,
    last_seen: Instant,
}

/// FIFO of pending changes with per-path coalescing
pub struct ChangeQueue {
    entries: VecDeque<QueuedChange>,
    debounce: Duration,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            debounce,
        }
    }

    pub fn push(&mut self, kind: ChangeKind, path: impl Into<PathBuf>) {
        self.push_at(kind, path, Instant::now());
    }

    /// Push an event observed at `at`
    pub fn push_at(&mut self, kind: ChangeKind, path: impl Into<PathBuf>, at: Instant) {
        let path = path.into();
        let debounce = self.debounce;

        let recent = self.entries.iter_mut().rev().find(|entry| {
            entry.event.path == path && at.saturating_duration_since(entry.last_seen) < debounce
        });

        match recent {
            Some(entry) => {
                log::debug!(
                    "Coalesced {} into queued {} for {:?}",
                    kind,
                    entry.event.kind,
                    path
                );
                entry.event.kind = kind;
                entry.last_seen = at;
            }
            None => self.entries.push_back(QueuedChange {
                event: ChangeEvent { kind, path },
                last_seen: at,
            }),
        }
    }

    /// Take every queued event in FIFO order
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        self.entries.drain(..).map(|entry| entry.event).collect()
    }

    /// Queued kind for a path, if any
    pub fn pending(&self, path: &Path) -> Option<ChangeKind> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.event.path == path)
            .map(|entry| entry.event.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}
