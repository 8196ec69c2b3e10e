//! # profsync Engine
//!
//! Multi-file synchronization engine for profsync.
//!
//! This crate provides:
//! - Per-file version ledger with write-after-mutate durability
//! - Debounced filesystem watcher over a set of workspace targets
//! - Remote channel abstraction (request/response plus push notifications)
//! - Sync engine with remote-wins conflict resolution
//! - Runtime wiring the watcher and push channel into a single event loop
//!
//! ## Architecture
//!
//! Three activity sources feed the engine: the watcher's event thread, the
//! push channel's delivery thread, and the runtime's health-check loop. All
//! of them funnel into one inbox drained by a single consumer, so engine
//! operations never interleave.
//!
//! ## Key Invariants
//!
//! - The remote is authoritative: conflicts resolve by taking its state
//! - Ledger versions are monotonically non-decreasing per path
//! - While a bulk pull is in flight, individual pushes are suppressed
//! - Remote-change handling is idempotent against duplicate notifications
//! - No single file's failure halts the watcher, listener, or event loop

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod loopback;
mod remote;
mod runtime;
mod version_store;
mod watcher;

pub use config::SyncConfig;
pub use engine::{PushOutcome, RemoteChangeOutcome, SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use loopback::LoopbackRemote;
pub use remote::{EventCallback, MockRemote, RemoteChannel, UploadOutcome};
pub use runtime::{RuntimeHandle, SyncRuntime};
pub use version_store::VersionStore;
pub use watcher::{ChangeEvent, ChangeKind, ChangeWatcher, DebounceGate, WatchTarget};
