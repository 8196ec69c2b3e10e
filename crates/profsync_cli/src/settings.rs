//! Configuration file loading.

use profsync_engine::{SyncConfig, WatchTarget};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk configuration (`profsync.json`).
///
/// `watch_files` entries are workspace-relative; a trailing `/` marks a
/// directory watched recursively.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Workspace root all synced paths are relative to.
    pub workspace: PathBuf,
    /// Files and directories to watch under the workspace.
    #[serde(default)]
    pub watch_files: Vec<String>,
    /// Version ledger location; defaults to `versions.json` next to the
    /// workspace.
    #[serde(default)]
    pub ledger: Option<PathBuf>,
}

impl Settings {
    /// Loads and parses the configuration file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {:?}: {e}", path))?;
        let settings: Settings = serde_json::from_str(&text)
            .map_err(|e| format!("cannot parse config {:?}: {e}", path))?;
        Ok(settings)
    }

    /// Builds the engine configuration from these settings.
    pub fn sync_config(&self) -> SyncConfig {
        let targets = self
            .watch_files
            .iter()
            .map(|entry| WatchTarget::parse(entry))
            .collect();
        let mut config = SyncConfig::new(&self.workspace).with_targets(targets);
        if let Some(ledger) = &self.ledger {
            config = config.with_ledger_path(ledger);
        }
        config
    }

    /// Resolved ledger path.
    pub fn ledger_path(&self) -> PathBuf {
        self.sync_config().ledger_path
    }
}
