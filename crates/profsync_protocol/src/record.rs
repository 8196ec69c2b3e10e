//! Versioned file snapshots.

use serde::{Deserialize, Serialize};

/// A single synchronized file as known to the remote store.
///
/// Identity is the workspace-relative `path`; the remote enforces uniqueness
/// per account. The `version` is the remote-assigned optimistic-concurrency
/// ticket: an upload is accepted only when the claimed version matches the
/// remote's current version for that path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Workspace-relative path, `/`-separated.
    pub path: String,
    /// Remote-assigned version number. Zero means "never seen by the remote".
    pub version: u64,
    /// File content.
    #[serde(with = "content_repr")]
    pub content: Vec<u8>,
}

impl FileRecord {
    /// Creates a new record.
    pub fn new(path: impl Into<String>, version: u64, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            version,
            content: content.into(),
        }
    }

    /// Returns the content interpreted as UTF-8, replacing invalid sequences.
    pub fn content_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Returns true if the record carries no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Serializes content as a UTF-8 string when possible so serialized records
/// stay human-readable for text profiles, falling back to a byte array for
/// non-UTF-8 content. Both forms are accepted when deserializing.
mod content_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.collect_seq(bytes.iter()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.into_bytes(),
            Repr::Bytes(bytes) => bytes,
        })
    }
}
