//! Long-running sync loop wiring the watcher, remote, and engine together.

use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::remote::RemoteChannel;
use crate::version_store::VersionStore;
use crate::watcher::{ChangeEvent, ChangeKind, ChangeWatcher};
use parking_lot::Mutex;
use profsync_protocol::{RemoteEvent, RemoteEventKind};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Message delivered to the runtime's consumer thread.
///
/// Local watcher events and remote push notifications funnel through one
/// channel, so a single consumer serializes every mutation of the
/// workspace and ledger. No per-path locking is needed.
enum Message {
    Local(ChangeEvent),
    Remote(RemoteEvent),
    Shutdown,
}

/// The assembled sync service: initial bulk pull, filesystem watcher,
/// push-notification subscription, and a consumer thread that drains them
/// all in arrival order.
///
/// Construct with [`SyncRuntime::new`], then call
/// [`start`](SyncRuntime::start) to launch; the returned
/// [`RuntimeHandle`] keeps everything alive and shuts it down on drop.
pub struct SyncRuntime<R: RemoteChannel + 'static> {
    config: SyncConfig,
    remote: Arc<R>,
}

impl<R: RemoteChannel + 'static> SyncRuntime<R> {
    /// Creates a runtime over the given configuration and remote.
    pub fn new(config: SyncConfig, remote: Arc<R>) -> Self {
        Self { config, remote }
    }

    /// Launches the sync service.
    ///
    /// Performs the initial bulk pull (a failure there is logged, not
    /// fatal: the health loop reconnects and re-pulls later), starts the
    /// watcher, subscribes to push notifications, and spawns the consumer
    /// thread.
    ///
    /// # Errors
    ///
    /// Fails if the watcher cannot be started or the subscription cannot
    /// be registered.
    pub fn start(self) -> SyncResult<RuntimeHandle<R>> {
        let store = VersionStore::open(&self.config.ledger_path);
        let engine = Arc::new(SyncEngine::new(
            self.config.workspace.clone(),
            store,
            Arc::clone(&self.remote),
        ));

        if let Err(e) = engine.pull_all() {
            warn!(error = %e, "initial pull failed, continuing with local state");
        }

        let (tx, rx) = mpsc::channel::<Message>();

        let mut watcher = ChangeWatcher::new(&self.config);
        let local_tx = tx.clone();
        watcher.start(move |event| {
            let _ = local_tx.send(Message::Local(event));
        })?;

        // mpsc senders are not Sync; the subscription callback must be.
        let remote_tx = Mutex::new(tx.clone());
        self.remote.subscribe(Box::new(move |event| {
            let _ = remote_tx.lock().send(Message::Remote(event));
        }))?;

        let consumer_engine = Arc::clone(&engine);
        let consumer_remote = Arc::clone(&self.remote);
        let health_interval = self.config.health_interval;
        let thread = thread::Builder::new()
            .name("profsync-consumer".into())
            .spawn(move || loop {
                match rx.recv_timeout(health_interval) {
                    Ok(Message::Local(event)) => {
                        handle_local(&consumer_engine, event);
                    }
                    Ok(Message::Remote(event)) => {
                        handle_remote(&consumer_engine, event);
                    }
                    Ok(Message::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        debug!("consumer thread exiting");
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        check_health(&consumer_engine, &consumer_remote);
                    }
                }
            })
            .map_err(|e| crate::error::SyncError::Watcher(format!("spawn failed: {e}")))?;

        info!(workspace = %self.config.workspace.display(), "sync runtime started");
        Ok(RuntimeHandle {
            tx,
            thread: Some(thread),
            watcher,
            engine,
            remote: self.remote,
        })
    }
}

fn handle_local<R: RemoteChannel>(engine: &SyncEngine<R>, event: ChangeEvent) {
    match event.kind {
        ChangeKind::Created | ChangeKind::Modified => {
            if let Err(e) = engine.push_file(&event.relative_path) {
                error!(path = %event.relative_path, error = %e, "push failed");
            }
        }
        // Deletions never propagate; the remote keeps its copy.
        ChangeKind::Deleted => {
            info!(path = %event.relative_path, "local file deleted, not propagated");
        }
    }
}

fn handle_remote<R: RemoteChannel>(engine: &SyncEngine<R>, event: RemoteEvent) {
    match event.kind {
        RemoteEventKind::FileUpdated => {
            if event.path.is_empty() {
                warn!(?event, "malformed update notification dropped");
                return;
            }
            if let Err(e) = engine.on_remote_change(&event.path, event.version) {
                error!(path = %event.path, error = %e, "failed to apply remote change");
            }
        }
        RemoteEventKind::Resync => {
            info!("resync requested by remote");
            if let Err(e) = engine.pull_all() {
                error!(error = %e, "resync pull failed");
            }
        }
    }
}

/// Reconnects a dropped push channel and re-pulls to cover notifications
/// missed while it was down. Failures are logged and retried on the next
/// interval.
fn check_health<R: RemoteChannel>(engine: &SyncEngine<R>, remote: &Arc<R>) {
    if remote.is_connected() {
        return;
    }

    debug!("push channel down, reconnecting");
    match remote.connect() {
        Ok(()) => {
            info!("push channel reconnected");
            if let Err(e) = engine.pull_all() {
                warn!(error = %e, "post-reconnect pull failed");
            }
        }
        Err(e) => {
            debug!(error = %e, "reconnect attempt failed");
        }
    }
}

/// Owns the running sync service.
///
/// Dropping the handle shuts the service down; [`shutdown`]
/// (RuntimeHandle::shutdown) does the same explicitly and joins the
/// consumer thread.
pub struct RuntimeHandle<R: RemoteChannel + 'static> {
    tx: mpsc::Sender<Message>,
    thread: Option<thread::JoinHandle<()>>,
    watcher: ChangeWatcher,
    engine: Arc<SyncEngine<R>>,
    remote: Arc<R>,
}

impl<R: RemoteChannel + 'static> RuntimeHandle<R> {
    /// The engine driving this runtime, for inspection.
    pub fn engine(&self) -> &SyncEngine<R> {
        &self.engine
    }

    /// Stops the watcher, closes the push channel, and joins the consumer
    /// thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.watcher.stop();
        // The shutdown message is queued before the channel closes, so the
        // consumer exits instead of treating the closed channel as a
        // dropped connection to re-establish.
        let _ = self.tx.send(Message::Shutdown);
        if let Err(e) = self.remote.close() {
            warn!(error = %e, "failed to close push channel");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("consumer thread panicked");
            }
        }
        info!("sync runtime stopped");
    }
}

impl<R: RemoteChannel + 'static> Drop for RuntimeHandle<R> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}
