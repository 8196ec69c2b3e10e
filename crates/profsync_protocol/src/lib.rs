//! # profsync Protocol
//!
//! Shared data types for the profsync synchronization engine.
//!
//! This crate provides:
//! - `FileRecord` for versioned file snapshots
//! - `RemoteEvent` for push-channel notifications
//! - `Conflict` for rejected uploads
//!
//! This is a pure data crate with no I/O operations. All types carry serde
//! derives; JSON is the interchange encoding used by collaborators and by
//! the on-disk version ledger.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod event;
mod record;

pub use conflict::Conflict;
pub use event::{RemoteEvent, RemoteEventKind};
pub use record::FileRecord;
