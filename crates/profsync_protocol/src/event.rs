//! Push-channel notifications.

use serde::{Deserialize, Serialize};

/// The kind of change a push notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEventKind {
    /// A single file changed on the remote.
    FileUpdated,
    /// The remote asks the client to re-pull everything. Emitted after
    /// server-side bulk changes where per-file notifications would be noise.
    Resync,
}

/// A notification delivered over the persistent push channel.
///
/// Delivery has no deduplication or ordering guarantee from the transport;
/// consumers must treat events as idempotent hints, not commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// What happened.
    pub kind: RemoteEventKind,
    /// Workspace-relative path of the changed file. Empty for `Resync`.
    #[serde(default)]
    pub path: String,
    /// Remote version after the change. Zero for `Resync`.
    #[serde(default)]
    pub version: u64,
}

impl RemoteEvent {
    /// Creates a per-file update notification.
    pub fn file_updated(path: impl Into<String>, version: u64) -> Self {
        Self {
            kind: RemoteEventKind::FileUpdated,
            path: path.into(),
            version,
        }
    }

    /// Creates a full-resync notification.
    pub fn resync() -> Self {
        Self {
            kind: RemoteEventKind::Resync,
            path: String::new(),
            version: 0,
        }
    }
}
