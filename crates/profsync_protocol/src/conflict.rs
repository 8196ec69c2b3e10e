//! Upload conflicts.

use serde::{Deserialize, Serialize};

/// Rejection returned when an upload's claimed version does not match the
/// remote's current version for that path.
///
/// A conflict is an expected branch of a push, not a failure: it carries the
/// remote's current state so the client can converge immediately. It is
/// never persisted; the resolution policy consumes it on the spot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The remote's current content for the path.
    pub latest_content: Vec<u8>,
    /// The remote's current version for the path.
    pub latest_version: u64,
}

impl Conflict {
    /// Creates a new conflict.
    pub fn new(latest_content: impl Into<Vec<u8>>, latest_version: u64) -> Self {
        Self {
            latest_content: latest_content.into(),
            latest_version,
        }
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "version conflict, remote is at {}", self.latest_version)
    }
}
