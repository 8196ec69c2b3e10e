//! The sync engine state machine.

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteChannel, UploadOutcome};
use crate::version_store::VersionStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Files written by bulk pulls.
    pub files_pulled: u64,
    /// Files uploaded successfully.
    pub files_pushed: u64,
    /// Conflicts resolved by taking the remote's state.
    pub conflicts_resolved: u64,
    /// Remote-change notifications applied locally.
    pub remote_changes_applied: u64,
    /// Pushes suppressed because a bulk pull was in flight.
    pub pushes_suppressed: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
}

/// Outcome of a single-file push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Upload accepted; the ledger now holds the new version.
    Uploaded(u64),
    /// Upload rejected; the remote's state replaced the local edit and the
    /// ledger holds the remote's version.
    ConflictResolved(u64),
    /// A bulk pull was in flight; nothing was sent.
    SkippedBulkSync,
    /// The local file was missing or unreadable; nothing to push.
    SkippedMissing,
}

/// Outcome of handling a remote-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChangeOutcome {
    /// Newer content was fetched and written locally.
    Applied,
    /// The notified version is not newer than the ledger's; duplicate or
    /// out-of-order notification, ignored.
    Stale,
    /// The path was gone by the time we fetched it; tolerated silently.
    Vanished,
}

/// Orchestrates local and remote changes against the version ledger,
/// applying the remote-wins conflict policy.
///
/// The engine holds its dependencies explicitly and exposes three
/// operations: [`pull_all`](Self::pull_all),
/// [`push_file`](Self::push_file), and
/// [`on_remote_change`](Self::on_remote_change). It performs no internal
/// queueing; callers serialize delivery (the runtime drains a single inbox).
pub struct SyncEngine<R: RemoteChannel> {
    workspace: PathBuf,
    store: VersionStore,
    remote: Arc<R>,
    bulk_syncing: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl<R: RemoteChannel> SyncEngine<R> {
    /// Creates an engine over the given workspace, ledger, and remote.
    pub fn new(workspace: impl Into<PathBuf>, store: VersionStore, remote: Arc<R>) -> Self {
        Self {
            workspace: workspace.into(),
            store,
            remote,
            bulk_syncing: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns current statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the version ledger.
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Returns the workspace root.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// True while a bulk pull is in flight.
    pub fn is_bulk_syncing(&self) -> bool {
        self.bulk_syncing.load(Ordering::SeqCst)
    }

    /// Pulls the remote's full file set into the workspace.
    ///
    /// Individual pushes are suppressed for the duration so a stale local
    /// edit cannot race freshly pulled state. Per-file write failures are
    /// logged and skipped; they never abort the rest of the batch. Ledger
    /// versions for all successfully written files persist in one write.
    ///
    /// Returns the number of files written.
    ///
    /// # Errors
    ///
    /// `RemoteUnavailable` or `AuthRequired` if the listing request itself
    /// fails; the suppression flag is released on every exit path.
    pub fn pull_all(&self) -> SyncResult<usize> {
        let _guard = BulkSyncGuard::acquire(&self.bulk_syncing);
        info!("pulling all files from remote");

        let records = self.remote.list_since(0)?;

        let mut versions = BTreeMap::new();
        for record in &records {
            match self.write_local(&record.path, &record.content) {
                Ok(()) => {
                    versions.insert(record.path.clone(), record.version);
                }
                Err(e) => {
                    error!(path = %record.path, error = %e, "pull write failed, skipping file");
                    self.stats.write().last_error = Some(e.to_string());
                }
            }
        }

        if let Err(e) = self.store.bulk_set(&versions) {
            // In-memory versions are updated; only durability suffered.
            warn!(error = %e, "ledger persist failed after pull");
        }

        let pulled = versions.len();
        self.stats.write().files_pulled += pulled as u64;
        info!(pulled, "pull complete");
        Ok(pulled)
    }

    /// Pushes one workspace file to the remote under the ledger's version
    /// claim.
    ///
    /// Skips (without error) while a bulk pull is in flight and when the
    /// local file is missing or unreadable. A version conflict resolves
    /// remote-wins: the local edit is discarded, the remote's content and
    /// version land locally. No merge is attempted.
    ///
    /// # Errors
    ///
    /// Transport and auth errors propagate with the ledger untouched and
    /// the local file as-is, so a later edit or retry re-attempts with the
    /// same claim.
    pub fn push_file(&self, path: &str) -> SyncResult<PushOutcome> {
        if self.is_bulk_syncing() {
            info!(path, "push skipped, bulk pull in flight");
            self.stats.write().pushes_suppressed += 1;
            return Ok(PushOutcome::SkippedBulkSync);
        }

        let absolute = self.workspace.join(path);
        let content = match std::fs::read(&absolute) {
            Ok(content) => content,
            Err(e) => {
                debug!(path, error = %e, "nothing to push");
                return Ok(PushOutcome::SkippedMissing);
            }
        };

        let local_version = self.store.get(path);
        debug!(path, version = local_version, bytes = content.len(), "uploading");

        match self.remote.upload(path, &content, local_version)? {
            UploadOutcome::Accepted { version } => {
                if let Err(e) = self.store.set(path, version) {
                    warn!(path, error = %e, "ledger persist failed after push");
                }
                self.stats.write().files_pushed += 1;
                info!(path, version, "pushed");
                Ok(PushOutcome::Uploaded(version))
            }
            UploadOutcome::Rejected(conflict) => {
                warn!(
                    path,
                    claimed = local_version,
                    latest = conflict.latest_version,
                    "version conflict, remote wins"
                );
                self.write_local(path, &conflict.latest_content)?;
                if let Err(e) = self.store.set(path, conflict.latest_version) {
                    warn!(path, error = %e, "ledger persist failed after conflict");
                }
                self.stats.write().conflicts_resolved += 1;
                Ok(PushOutcome::ConflictResolved(conflict.latest_version))
            }
        }
    }

    /// Handles a push-channel notification that `path` changed remotely.
    ///
    /// Idempotent: a version not strictly greater than the ledger's is a
    /// no-op, so duplicate and out-of-order notifications are harmless.
    /// A notification racing a remote deletion (fetch finds nothing) is
    /// tolerated silently.
    pub fn on_remote_change(&self, path: &str, remote_version: u64) -> SyncResult<RemoteChangeOutcome> {
        let local_version = self.store.get(path);
        if remote_version <= local_version {
            debug!(path, remote_version, local_version, "stale notification ignored");
            return Ok(RemoteChangeOutcome::Stale);
        }

        let record = match self.remote.fetch(path)? {
            Some(record) => record,
            None => {
                debug!(path, "notified file vanished from remote");
                return Ok(RemoteChangeOutcome::Vanished);
            }
        };

        self.write_local(path, &record.content)?;
        if let Err(e) = self.store.set(path, remote_version) {
            warn!(path, error = %e, "ledger persist failed after remote change");
        }
        self.stats.write().remote_changes_applied += 1;
        info!(path, version = remote_version, "applied remote change");
        Ok(RemoteChangeOutcome::Applied)
    }

    /// Writes content to a workspace-relative path, creating parent
    /// directories as needed. Remote paths never leave the workspace.
    fn write_local(&self, path: &str, content: &[u8]) -> SyncResult<()> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(SyncError::local_io(
                relative,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path escapes workspace"),
            ));
        }

        let absolute = self.workspace.join(relative);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::local_io(parent, e))?;
        }
        std::fs::write(&absolute, content).map_err(|e| SyncError::local_io(&absolute, e))
    }
}

/// Scoped holder of the process-wide bulk-sync flag; releases on drop so
/// the flag clears even when a pull fails partway.
struct BulkSyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BulkSyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for BulkSyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use profsync_protocol::{Conflict, FileRecord};
    use tempfile::tempdir;

    fn make_engine(dir: &Path) -> (SyncEngine<MockRemote>, Arc<MockRemote>) {
        let remote = Arc::new(MockRemote::new());
        let store = VersionStore::open(dir.join("versions.json"));
        let workspace = dir.join("workspace");
        std::fs::create_dir_all(&workspace).unwrap();
        let engine = SyncEngine::new(workspace, store, Arc::clone(&remote));
        (engine, remote)
    }

    #[test]
    fn push_updates_ledger_on_accept() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        std::fs::write(engine.workspace().join("notes.md"), b"local edit").unwrap();
        engine.store().set("notes.md", 3).unwrap();
        remote.set_upload_response(Ok(UploadOutcome::Accepted { version: 4 }));

        let outcome = engine.push_file("notes.md").unwrap();
        assert_eq!(outcome, PushOutcome::Uploaded(4));
        assert_eq!(engine.store().get("notes.md"), 4);

        // The upload carried the ledger's version as the claim.
        let uploads = remote.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, b"local edit");
        assert_eq!(uploads[0].2, 3);
    }

    #[test]
    fn push_conflict_converges_to_remote_state() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        let local = engine.workspace().join("notes.md");
        std::fs::write(&local, b"my edit").unwrap();
        engine.store().set("notes.md", 3).unwrap();
        remote.set_upload_response(Ok(UploadOutcome::Rejected(Conflict::new(
            b"X".to_vec(),
            6,
        ))));

        let outcome = engine.push_file("notes.md").unwrap();
        assert_eq!(outcome, PushOutcome::ConflictResolved(6));

        // Remote wins: local content and ledger both reflect the remote.
        assert_eq!(std::fs::read(&local).unwrap(), b"X");
        assert_eq!(engine.store().get("notes.md"), 6);
        assert_eq!(engine.stats().conflicts_resolved, 1);
    }

    #[test]
    fn push_suppressed_during_bulk_sync() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        std::fs::write(engine.workspace().join("notes.md"), b"edit").unwrap();
        engine.store().set("notes.md", 2).unwrap();
        engine.bulk_syncing.store(true, Ordering::SeqCst);

        let outcome = engine.push_file("notes.md").unwrap();
        assert_eq!(outcome, PushOutcome::SkippedBulkSync);

        // No upload was sent and the ledger is unchanged.
        assert!(remote.uploads().is_empty());
        assert_eq!(engine.store().get("notes.md"), 2);
    }

    #[test]
    fn push_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        let outcome = engine.push_file("never-created.md").unwrap();
        assert_eq!(outcome, PushOutcome::SkippedMissing);
        assert!(remote.uploads().is_empty());
    }

    #[test]
    fn push_transport_error_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        let local = engine.workspace().join("notes.md");
        std::fs::write(&local, b"edit").unwrap();
        engine.store().set("notes.md", 2).unwrap();
        remote.set_upload_response(Err(SyncError::remote_unavailable("down")));

        assert!(engine.push_file("notes.md").is_err());
        assert_eq!(engine.store().get("notes.md"), 2);
        assert_eq!(std::fs::read(&local).unwrap(), b"edit");
    }

    #[test]
    fn pull_all_writes_files_and_versions() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        remote.set_list_response(Ok(vec![
            FileRecord::new("SOUL.md", 2, b"soul".to_vec()),
            FileRecord::new("memory/notes.md", 5, b"notes".to_vec()),
        ]));

        let pulled = engine.pull_all().unwrap();
        assert_eq!(pulled, 2);
        assert_eq!(
            std::fs::read(engine.workspace().join("memory/notes.md")).unwrap(),
            b"notes"
        );
        assert_eq!(engine.store().get("SOUL.md"), 2);
        assert_eq!(engine.store().get("memory/notes.md"), 5);
        assert!(!engine.is_bulk_syncing());
    }

    #[test]
    fn pull_all_skips_unwritable_files() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        // "memory" exists as a directory, so a file of the same name fails.
        std::fs::create_dir_all(engine.workspace().join("memory")).unwrap();
        remote.set_list_response(Ok(vec![
            FileRecord::new("memory", 1, b"collides".to_vec()),
            FileRecord::new("ok.md", 3, b"fine".to_vec()),
        ]));

        let pulled = engine.pull_all().unwrap();
        assert_eq!(pulled, 1);
        assert_eq!(engine.store().get("ok.md"), 3);
        assert_eq!(engine.store().get("memory"), 0);
    }

    #[test]
    fn pull_all_clears_flag_on_failure() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        remote.set_list_response(Err(SyncError::remote_unavailable("listing failed")));
        assert!(engine.pull_all().is_err());
        assert!(!engine.is_bulk_syncing());
    }

    #[test]
    fn remote_change_applies_newer_version() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        engine.store().set("notes.md", 4).unwrap();
        remote.set_fetch_response(Some(FileRecord::new("notes.md", 5, b"newer".to_vec())));

        let outcome = engine.on_remote_change("notes.md", 5).unwrap();
        assert_eq!(outcome, RemoteChangeOutcome::Applied);
        assert_eq!(engine.store().get("notes.md"), 5);
        assert_eq!(
            std::fs::read(engine.workspace().join("notes.md")).unwrap(),
            b"newer"
        );

        // A second identical notification is a no-op.
        let outcome = engine.on_remote_change("notes.md", 5).unwrap();
        assert_eq!(outcome, RemoteChangeOutcome::Stale);
    }

    #[test]
    fn remote_change_ignores_stale_versions() {
        let dir = tempdir().unwrap();
        let (engine, _remote) = make_engine(dir.path());

        engine.store().set("notes.md", 4).unwrap();
        assert_eq!(
            engine.on_remote_change("notes.md", 4).unwrap(),
            RemoteChangeOutcome::Stale
        );
        assert_eq!(
            engine.on_remote_change("notes.md", 3).unwrap(),
            RemoteChangeOutcome::Stale
        );
        assert_eq!(engine.store().get("notes.md"), 4);
    }

    #[test]
    fn remote_change_tolerates_vanished_file() {
        let dir = tempdir().unwrap();
        let (engine, remote) = make_engine(dir.path());

        remote.set_fetch_response(None);
        let outcome = engine.on_remote_change("gone.md", 2).unwrap();
        assert_eq!(outcome, RemoteChangeOutcome::Vanished);
        assert_eq!(engine.store().get("gone.md"), 0);
    }

    #[test]
    fn ledger_never_regresses_across_operations() {
        let dir = tempdir().unwrap();
        let remote = Arc::new(crate::loopback::LoopbackRemote::new());
        let workspace = dir.path().join("workspace");
        std::fs::create_dir_all(&workspace).unwrap();
        let engine = SyncEngine::new(
            &workspace,
            VersionStore::open(dir.path().join("versions.json")),
            Arc::clone(&remote),
        );

        let mut observed = vec![engine.store().get("notes.md")];
        let mut record = |engine: &SyncEngine<_>| observed.push(engine.store().get("notes.md"));

        std::fs::write(workspace.join("notes.md"), b"v1").unwrap();
        engine.push_file("notes.md").unwrap();
        record(&engine);

        // Remote races ahead; applying the newer version moves forward,
        // stale and duplicate notifications do not move at all.
        remote.external_commit("notes.md", b"v2".to_vec());
        let v3 = remote.external_commit("notes.md", b"v3".to_vec());
        engine.on_remote_change("notes.md", v3).unwrap();
        record(&engine);
        engine.on_remote_change("notes.md", 2).unwrap();
        record(&engine);

        std::fs::write(workspace.join("notes.md"), b"v4").unwrap();
        engine.push_file("notes.md").unwrap();
        record(&engine);

        // A losing push adopts the remote's higher version.
        remote.external_commit("notes.md", b"v5".to_vec());
        std::fs::write(workspace.join("notes.md"), b"stale edit").unwrap();
        engine.push_file("notes.md").unwrap();
        record(&engine);

        engine.pull_all().unwrap();
        record(&engine);

        assert!(
            observed.windows(2).all(|pair| pair[0] <= pair[1]),
            "ledger regressed: {observed:?}"
        );
        assert_eq!(engine.store().get("notes.md"), 5);
    }

    #[test]
    fn write_local_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let (engine, _remote) = make_engine(dir.path());

        assert!(engine.write_local("../outside.md", b"x").is_err());
        assert!(engine.write_local("/etc/passwd", b"x").is_err());
    }
}
