//! Configuration for the sync engine and runtime.

use crate::watcher::WatchTarget;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Workspace root all synced paths are relative to.
    pub workspace: PathBuf,
    /// Watch targets (files and subtrees) under the workspace.
    pub targets: Vec<WatchTarget>,
    /// Location of the version ledger document.
    pub ledger_path: PathBuf,
    /// Quiet interval for the watcher's per-path debounce.
    pub debounce: Duration,
    /// Filename suffixes the watcher drops silently.
    pub ignored_suffixes: Vec<String>,
    /// How often the runtime checks push-channel health.
    pub health_interval: Duration,
}

impl SyncConfig {
    /// Creates a configuration for the given workspace root.
    ///
    /// The ledger defaults to `versions.json` next to the workspace.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        let ledger_path = workspace
            .parent()
            .unwrap_or(Path::new("."))
            .join("versions.json");
        Self {
            workspace,
            targets: Vec::new(),
            ledger_path,
            debounce: Duration::from_secs(1),
            ignored_suffixes: default_ignored_suffixes(),
            health_interval: Duration::from_secs(1),
        }
    }

    /// Adds a watch target.
    pub fn with_target(mut self, target: WatchTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Replaces the watch targets.
    pub fn with_targets(mut self, targets: Vec<WatchTarget>) -> Self {
        self.targets = targets;
        self
    }

    /// Sets the ledger document path.
    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    /// Sets the debounce quiet interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the push-channel health check interval.
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }
}

/// Editor temp/backup/swap markers dropped by the watcher.
fn default_ignored_suffixes() -> Vec<String> {
    vec![
        ".tmp".to_string(),
        ".swp".to_string(),
        ".bak".to_string(),
        "~".to_string(),
    ]
}
