//! Durable per-file version ledger.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Durable mapping from workspace-relative path to the last version the
/// local content was known to match on the remote side.
///
/// The ledger is the source of truth for optimistic concurrency checks.
/// Versions are monotonically non-decreasing per path over the store's
/// lifetime; entries are created the first time a path is seen and never
/// deleted by the engine.
///
/// # Durability
///
/// Every mutation persists synchronously (write-after-mutate), so a crash
/// never loses a committed version ahead of disk. A failed persist still
/// updates the in-memory value; callers must not assume durability when
/// `set` returns `SyncError::Persistence`.
///
/// # Recovery
///
/// Loading tolerates an absent, corrupt, or unreadable backing file by
/// starting from an empty mapping. That is always safe: unseen paths read
/// as version 0, and the next push either succeeds or surfaces a conflict
/// that resynchronizes state at the cost of one extra round trip.
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    versions: RwLock<BTreeMap<String, u64>>,
}

impl VersionStore {
    /// Opens the ledger at the given path, loading existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let versions = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, u64>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!(ledger = %path.display(), error = %e, "corrupt version ledger, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(ledger = %path.display(), error = %e, "unreadable version ledger, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            versions: RwLock::new(versions),
        }
    }

    /// Returns the stored version for a path, or 0 if the path is unseen.
    pub fn get(&self, path: &str) -> u64 {
        self.versions.read().get(path).copied().unwrap_or(0)
    }

    /// Overwrites the version for a path and persists immediately.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` if the backing file cannot be
    /// written. The in-memory value is updated regardless.
    pub fn set(&self, path: &str, version: u64) -> SyncResult<()> {
        self.versions.write().insert(path.to_string(), version);
        self.persist()
    }

    /// Applies every entry then persists once.
    ///
    /// Used after a full pull to avoid one disk write per file.
    pub fn bulk_set(&self, updates: &BTreeMap<String, u64>) -> SyncResult<()> {
        {
            let mut versions = self.versions.write();
            for (path, version) in updates {
                versions.insert(path.clone(), *version);
            }
        }
        self.persist()
    }

    /// Returns a snapshot of all tracked paths and versions.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.versions.read().clone()
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.versions.read().len()
    }

    /// Returns true if no paths are tracked.
    pub fn is_empty(&self) -> bool {
        self.versions.read().is_empty()
    }

    /// Returns the ledger document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> SyncResult<()> {
        let text = {
            let versions = self.versions.read();
            serde_json::to_string_pretty(&*versions)
                .map_err(|e| SyncError::Protocol(format!("ledger encode failed: {e}")))?
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::persistence(&self.path, e))?;
        }
        std::fs::write(&self.path, text).map_err(|e| SyncError::persistence(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn unseen_path_reads_zero() {
        let dir = tempdir().unwrap();
        let store = VersionStore::open(dir.path().join("versions.json"));
        assert_eq!(store.get("notes.md"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn set_then_get() {
        let dir = tempdir().unwrap();
        let store = VersionStore::open(dir.path().join("versions.json"));
        store.set("memory/notes.md", 4).unwrap();
        assert_eq!(store.get("memory/notes.md"), 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn versions_survive_reopen() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("versions.json");

        {
            let store = VersionStore::open(&ledger);
            store.set("SOUL.md", 2).unwrap();
            store.set("memory/notes.md", 7).unwrap();
        }

        let store = VersionStore::open(&ledger);
        assert_eq!(store.get("SOUL.md"), 2);
        assert_eq!(store.get("memory/notes.md"), 7);
    }

    #[test]
    fn corrupt_ledger_starts_empty() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("versions.json");
        std::fs::write(&ledger, "{not json").unwrap();

        let store = VersionStore::open(&ledger);
        assert!(store.is_empty());
        assert_eq!(store.get("anything"), 0);

        // The store is still usable after recovery.
        store.set("anything", 1).unwrap();
        assert_eq!(store.get("anything"), 1);
    }

    #[test]
    fn bulk_set_applies_all_entries() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("versions.json");
        let store = VersionStore::open(&ledger);

        let mut updates = BTreeMap::new();
        updates.insert("a.md".to_string(), 1);
        updates.insert("b.md".to_string(), 3);
        store.bulk_set(&updates).unwrap();

        assert_eq!(store.get("a.md"), 1);
        assert_eq!(store.get("b.md"), 3);

        let reopened = VersionStore::open(&ledger);
        assert_eq!(reopened.get("b.md"), 3);
    }

    #[test]
    fn set_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("state").join("versions.json");
        let store = VersionStore::open(&ledger);
        store.set("x", 1).unwrap();
        assert!(ledger.exists());
    }

    proptest! {
        #[test]
        fn ledger_roundtrips_arbitrary_maps(
            entries in proptest::collection::btree_map("[a-z/._-]{1,24}", 0u64..1_000_000, 0..32)
        ) {
            let dir = tempdir().unwrap();
            let ledger = dir.path().join("versions.json");

            let store = VersionStore::open(&ledger);
            store.bulk_set(&entries).unwrap();

            let reopened = VersionStore::open(&ledger);
            prop_assert_eq!(reopened.snapshot(), entries);
        }
    }
}
