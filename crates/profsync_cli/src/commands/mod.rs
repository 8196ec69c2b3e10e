//! CLI command implementations.

pub mod inspect;
pub mod verify;
pub mod watch;
