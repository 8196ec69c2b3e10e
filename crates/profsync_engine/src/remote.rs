//! Remote channel abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use profsync_protocol::{Conflict, FileRecord, RemoteEvent};
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback invoked for every push-channel notification.
pub type EventCallback = Box<dyn Fn(RemoteEvent) + Send + Sync>;

/// Outcome of an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The remote accepted the upload and assigned a new version.
    Accepted {
        /// Version assigned by the remote.
        version: u64,
    },
    /// The claimed version did not match the remote's current version.
    Rejected(Conflict),
}

/// The two transport primitives the engine needs: request/response file
/// operations and a subscribed push notification stream, with channel
/// health and reconnect signaling.
///
/// This trait abstracts the network layer; implementations may speak HTTP
/// plus WebSocket, or stay entirely in process for tests.
pub trait RemoteChannel: Send + Sync {
    /// Lists every file changed since the given token; `0` means "since
    /// epoch", returning the full file set.
    ///
    /// # Errors
    ///
    /// `RemoteUnavailable` on transport failure, `AuthRequired` on an
    /// expired credential.
    fn list_since(&self, token: u64) -> SyncResult<Vec<FileRecord>>;

    /// Fetches a single path's current record. `None` signals "not found",
    /// which is not an error.
    fn fetch(&self, path: &str) -> SyncResult<Option<FileRecord>>;

    /// Uploads content for a path, claiming `expected_version`. The remote
    /// accepts only if the claim matches its current version; otherwise it
    /// rejects with a conflict carrying its current state.
    fn upload(&self, path: &str, content: &[u8], expected_version: u64)
        -> SyncResult<UploadOutcome>;

    /// Registers the push-notification callback. Delivery tolerates
    /// duplicates and out-of-order arrival; consumers must be idempotent.
    fn subscribe(&self, callback: EventCallback) -> SyncResult<()>;

    /// Returns true while the push channel is healthy.
    fn is_connected(&self) -> bool;

    /// Attempts to (re)establish the push channel.
    fn connect(&self) -> SyncResult<()>;

    /// Closes the channel.
    fn close(&self) -> SyncResult<()>;
}

/// A scripted remote for testing.
///
/// Responses are set ahead of time; every upload attempt is recorded so
/// tests can assert that suppressed pushes sent nothing.
#[derive(Default)]
pub struct MockRemote {
    connected: AtomicBool,
    list_response: Mutex<Option<SyncResult<Vec<FileRecord>>>>,
    fetch_response: Mutex<Option<Option<FileRecord>>>,
    upload_response: Mutex<Option<SyncResult<UploadOutcome>>>,
    uploads: Mutex<Vec<(String, Vec<u8>, u64)>>,
    subscriber: Mutex<Option<EventCallback>>,
}

impl MockRemote {
    /// Creates a connected mock with no scripted responses.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Scripts the next `list_since` response.
    pub fn set_list_response(&self, response: SyncResult<Vec<FileRecord>>) {
        *self.list_response.lock() = Some(response);
    }

    /// Scripts the `fetch` response.
    pub fn set_fetch_response(&self, response: Option<FileRecord>) {
        *self.fetch_response.lock() = Some(response);
    }

    /// Scripts the next `upload` response.
    pub fn set_upload_response(&self, response: SyncResult<UploadOutcome>) {
        *self.upload_response.lock() = Some(response);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// All `(path, content, expected_version)` upload attempts so far.
    pub fn uploads(&self) -> Vec<(String, Vec<u8>, u64)> {
        self.uploads.lock().clone()
    }

    /// Delivers a push notification to the registered subscriber.
    pub fn fire_event(&self, event: RemoteEvent) {
        if let Some(callback) = self.subscriber.lock().as_ref() {
            callback(event);
        }
    }
}

impl RemoteChannel for MockRemote {
    fn list_since(&self, _token: u64) -> SyncResult<Vec<FileRecord>> {
        self.list_response
            .lock()
            .take()
            .unwrap_or_else(|| Err(SyncError::Protocol("no mock list response set".into())))
    }

    fn fetch(&self, _path: &str) -> SyncResult<Option<FileRecord>> {
        Ok(self.fetch_response.lock().clone().flatten())
    }

    fn upload(
        &self,
        path: &str,
        content: &[u8],
        expected_version: u64,
    ) -> SyncResult<UploadOutcome> {
        self.uploads
            .lock()
            .push((path.to_string(), content.to_vec(), expected_version));
        self.upload_response
            .lock()
            .take()
            .unwrap_or_else(|| Err(SyncError::Protocol("no mock upload response set".into())))
    }

    fn subscribe(&self, callback: EventCallback) -> SyncResult<()> {
        *self.subscriber.lock() = Some(callback);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> SyncResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
