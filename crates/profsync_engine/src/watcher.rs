//! Debounced filesystem watcher over workspace targets.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use notify::event::RemoveKind;
use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A path the watcher observes, relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// A single file.
    File(String),
    /// A whole subtree, watched recursively.
    Subtree(String),
}

impl WatchTarget {
    /// Creates a single-file target.
    pub fn file(path: impl Into<String>) -> Self {
        WatchTarget::File(path.into())
    }

    /// Creates a subtree target.
    pub fn subtree(path: impl Into<String>) -> Self {
        WatchTarget::Subtree(path.into())
    }

    /// Parses a configuration entry: a trailing `/` marks a subtree.
    pub fn parse(entry: &str) -> Self {
        match entry.strip_suffix('/') {
            Some(dir) => WatchTarget::Subtree(dir.to_string()),
            None => WatchTarget::File(entry.to_string()),
        }
    }

    /// Workspace-relative path of the target.
    pub fn relative_path(&self) -> &str {
        match self {
            WatchTarget::File(p) | WatchTarget::Subtree(p) => p,
        }
    }

    /// Returns true for subtree targets.
    pub fn is_subtree(&self) -> bool {
        matches!(self, WatchTarget::Subtree(_))
    }
}

/// Classified change kind delivered to the watcher callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File appeared.
    Created,
    /// File content changed.
    Modified,
    /// File was removed.
    Deleted,
}

/// A debounced, classified, path-normalized change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// Path relative to the workspace root, `/`-separated.
    pub relative_path: String,
    /// Absolute path on disk.
    pub absolute_path: PathBuf,
}

/// Per-path quiet-interval gate.
///
/// An event for a path passes only if at least the configured interval has
/// elapsed since the last event that passed for the same path; passing an
/// event resets the window to now. Suppressed events do not reset it, so a
/// burst shorter than the interval collapses to a single delivery.
/// Deletions always pass: there is nothing to coalesce.
#[derive(Debug)]
pub struct DebounceGate {
    interval: Duration,
    last_delivered: Mutex<HashMap<PathBuf, Instant>>,
}

impl DebounceGate {
    /// Creates a gate with the given quiet interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_delivered: Mutex::new(HashMap::new()),
        }
    }

    /// Decides whether an event observed at `now` should be delivered.
    pub fn should_deliver(&self, path: &Path, kind: ChangeKind, now: Instant) -> bool {
        if kind == ChangeKind::Deleted {
            self.last_delivered.lock().remove(path);
            return true;
        }

        let mut last = self.last_delivered.lock();
        match last.get(path) {
            Some(&previous) if now.duration_since(previous) < self.interval => false,
            _ => {
                last.insert(path.to_path_buf(), now);
                true
            }
        }
    }
}

/// Watches a configured set of workspace targets and delivers debounced
/// change notifications to a single registered callback.
///
/// The callback runs on the OS notification thread; it should hand events
/// off quickly (the runtime forwards them into its inbox channel).
pub struct ChangeWatcher {
    workspace: PathBuf,
    targets: Vec<WatchTarget>,
    ignored_suffixes: Vec<String>,
    debounce: Duration,
    inner: Option<RecommendedWatcher>,
}

impl ChangeWatcher {
    /// Creates a watcher from the sync configuration.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            workspace: config.workspace.clone(),
            targets: config.targets.clone(),
            ignored_suffixes: config.ignored_suffixes.clone(),
            debounce: config.debounce,
            inner: None,
        }
    }

    /// Starts watching and delivering events to `callback`.
    ///
    /// Missing targets are created first (empty file, or directory for
    /// subtree targets) so the OS notification mechanism has something to
    /// attach to.
    ///
    /// # Errors
    ///
    /// Fails if already started, if a target cannot be created, or if the
    /// OS watch cannot be registered.
    pub fn start<F>(&mut self, callback: F) -> SyncResult<()>
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        if self.inner.is_some() {
            return Err(SyncError::Watcher("watcher already started".into()));
        }

        for target in &self.targets {
            self.ensure_target_exists(target)?;
        }

        let workspace = self.workspace.clone();
        let gate = Arc::new(DebounceGate::new(self.debounce));
        let ignored = self.ignored_suffixes.clone();

        let mut watcher = recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "watch backend error");
                    return;
                }
            };

            let kind = match classify(&event.kind) {
                Some(kind) => kind,
                None => return,
            };

            for absolute in event.paths {
                // Only file-level events are delivered.
                if kind != ChangeKind::Deleted && absolute.is_dir() {
                    continue;
                }
                if kind == ChangeKind::Deleted
                    && matches!(event.kind, EventKind::Remove(RemoveKind::Folder))
                {
                    continue;
                }
                if is_ignored(&absolute, &ignored) {
                    continue;
                }

                let relative = match relative_to(&workspace, &absolute) {
                    Some(rel) => rel,
                    None => continue,
                };

                if !gate.should_deliver(&absolute, kind, Instant::now()) {
                    debug!(path = %relative, "debounced");
                    continue;
                }

                callback(ChangeEvent {
                    kind,
                    relative_path: relative,
                    absolute_path: absolute.clone(),
                });
            }
        })?;

        for target in &self.targets {
            let absolute = self.workspace.join(target.relative_path());
            let mode = if target.is_subtree() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&absolute, mode)?;
            debug!(target = %absolute.display(), recursive = target.is_subtree(), "watching");
        }

        self.inner = Some(watcher);
        Ok(())
    }

    /// Stops delivering notifications and releases OS watch handles.
    ///
    /// Safe to call even if the watcher was never started.
    pub fn stop(&mut self) {
        if self.inner.take().is_some() {
            debug!("watcher stopped");
        }
    }

    /// Returns true while the watcher is running.
    pub fn is_running(&self) -> bool {
        self.inner.is_some()
    }

    fn ensure_target_exists(&self, target: &WatchTarget) -> SyncResult<()> {
        let absolute = self.workspace.join(target.relative_path());
        if absolute.exists() {
            return Ok(());
        }

        if target.is_subtree() {
            std::fs::create_dir_all(&absolute).map_err(|e| SyncError::local_io(&absolute, e))?;
        } else {
            if let Some(parent) = absolute.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SyncError::local_io(parent, e))?;
            }
            std::fs::write(&absolute, b"").map_err(|e| SyncError::local_io(&absolute, e))?;
        }
        Ok(())
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Maps a raw notification kind onto the delivered classification.
fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}

/// Returns true for editor temp/backup/swap files.
fn is_ignored(path: &Path, suffixes: &[String]) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return true,
    };
    suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
}

/// Normalizes an absolute event path to a `/`-separated workspace-relative
/// path; events outside the workspace are dropped.
fn relative_to(workspace: &Path, absolute: &Path) -> Option<String> {
    let relative = absolute.strip_prefix(workspace).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
