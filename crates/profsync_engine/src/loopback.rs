//! In-process remote store.

use crate::error::{SyncError, SyncResult};
use crate::remote::{EventCallback, RemoteChannel, UploadOutcome};
use parking_lot::{Mutex, RwLock};
use profsync_protocol::{Conflict, FileRecord, RemoteEvent};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A complete in-process remote: versioned per-path store, optimistic
/// version checks, and push-notification broadcast to subscribers.
///
/// Behaves like the real remote without network overhead, which makes it
/// the workhorse of the integration tests: `external_commit` plays the role
/// of another device editing the same account, and `set_connected(false)`
/// simulates a dropped push channel.
#[derive(Default)]
pub struct LoopbackRemote {
    files: RwLock<BTreeMap<String, FileRecord>>,
    subscribers: Mutex<Vec<EventCallback>>,
    connected: AtomicBool,
    reachable: AtomicBool,
}

impl LoopbackRemote {
    /// Creates an empty, reachable remote with a healthy push channel.
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            reachable: AtomicBool::new(true),
        }
    }

    /// Commits content as if another device uploaded it, bumping the
    /// version and notifying subscribers.
    pub fn external_commit(&self, path: &str, content: impl Into<Vec<u8>>) -> u64 {
        let version = {
            let mut files = self.files.write();
            let next = files.get(path).map(|r| r.version + 1).unwrap_or(1);
            files.insert(path.to_string(), FileRecord::new(path, next, content.into()));
            next
        };
        self.broadcast(RemoteEvent::file_updated(path, version));
        version
    }

    /// Asks every subscriber to re-pull, as the remote does after a
    /// server-side bulk change.
    pub fn request_resync(&self) {
        self.broadcast(RemoteEvent::resync());
    }

    /// Current version for a path, 0 if absent.
    pub fn version_of(&self, path: &str) -> u64 {
        self.files.read().get(path).map(|r| r.version).unwrap_or(0)
    }

    /// Current content for a path.
    pub fn content_of(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().get(path).map(|r| r.content.clone())
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// Simulates push-channel health without affecting request/response
    /// reachability.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Simulates total remote outage: request/response operations fail
    /// with `RemoteUnavailable` until reachability is restored.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::remote_unavailable("loopback remote offline"))
        }
    }

    fn broadcast(&self, event: RemoteEvent) {
        if !self.connected.load(Ordering::SeqCst) {
            debug!(?event, "push channel down, notification dropped");
            return;
        }
        for subscriber in self.subscribers.lock().iter() {
            subscriber(event.clone());
        }
    }
}

impl RemoteChannel for LoopbackRemote {
    fn list_since(&self, _token: u64) -> SyncResult<Vec<FileRecord>> {
        self.check_reachable()?;
        Ok(self.files.read().values().cloned().collect())
    }

    fn fetch(&self, path: &str) -> SyncResult<Option<FileRecord>> {
        self.check_reachable()?;
        Ok(self.files.read().get(path).cloned())
    }

    fn upload(
        &self,
        path: &str,
        content: &[u8],
        expected_version: u64,
    ) -> SyncResult<UploadOutcome> {
        self.check_reachable()?;

        let outcome = {
            let mut files = self.files.write();
            let current = files.get(path).map(|r| r.version).unwrap_or(0);
            if current != expected_version {
                let existing = files.get(path).cloned().unwrap_or_else(|| {
                    FileRecord::new(path, current, Vec::new())
                });
                return Ok(UploadOutcome::Rejected(Conflict::new(
                    existing.content,
                    existing.version,
                )));
            }

            let version = current + 1;
            files.insert(
                path.to_string(),
                FileRecord::new(path, version, content.to_vec()),
            );
            version
        };

        self.broadcast(RemoteEvent::file_updated(path, outcome));
        Ok(UploadOutcome::Accepted { version: outcome })
    }

    fn subscribe(&self, callback: EventCallback) -> SyncResult<()> {
        self.subscribers.lock().push(callback);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> SyncResult<()> {
        self.check_reachable()?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_assigns_sequential_versions() {
        let remote = LoopbackRemote::new();

        let first = remote.upload("notes.md", b"v1", 0).unwrap();
        assert_eq!(first, UploadOutcome::Accepted { version: 1 });

        let second = remote.upload("notes.md", b"v2", 1).unwrap();
        assert_eq!(second, UploadOutcome::Accepted { version: 2 });
    }

    #[test]
    fn stale_upload_is_rejected_with_current_state() {
        let remote = LoopbackRemote::new();
        remote.upload("notes.md", b"first", 0).unwrap();
        remote.upload("notes.md", b"second", 1).unwrap();

        // A client still claiming version 1 loses.
        match remote.upload("notes.md", b"stale edit", 1).unwrap() {
            UploadOutcome::Rejected(conflict) => {
                assert_eq!(conflict.latest_content, b"second");
                assert_eq!(conflict.latest_version, 2);
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // The rejected content never landed.
        assert_eq!(remote.content_of("notes.md").unwrap(), b"second");
    }

    #[test]
    fn external_commit_notifies_subscribers() {
        let remote = LoopbackRemote::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        remote
            .subscribe(Box::new(move |event| sink.lock().push(event)))
            .unwrap();

        let version = remote.external_commit("notes.md", b"from another device".to_vec());
        assert_eq!(version, 1);

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], RemoteEvent::file_updated("notes.md", 1));
    }

    #[test]
    fn disconnected_channel_drops_notifications() {
        let remote = LoopbackRemote::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        remote
            .subscribe(Box::new(move |event| sink.lock().push(event)))
            .unwrap();

        remote.set_connected(false);
        remote.external_commit("notes.md", b"x".to_vec());
        assert!(seen.lock().is_empty());

        // Request/response operations still work.
        assert_eq!(remote.version_of("notes.md"), 1);
        assert!(remote.fetch("notes.md").unwrap().is_some());
    }

    #[test]
    fn unreachable_remote_fails_requests() {
        let remote = LoopbackRemote::new();
        remote.set_reachable(false);

        assert!(matches!(
            remote.list_since(0),
            Err(SyncError::RemoteUnavailable { .. })
        ));
        assert!(remote.connect().is_err());

        remote.set_reachable(true);
        assert!(remote.list_since(0).is_ok());
    }

    #[test]
    fn list_since_returns_full_set() {
        let remote = LoopbackRemote::new();
        remote.external_commit("a.md", b"a".to_vec());
        remote.external_commit("b.md", b"b".to_vec());

        let records = remote.list_since(0).unwrap();
        assert_eq!(records.len(), 2);
    }
}
