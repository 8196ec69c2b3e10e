//! Watch command implementation.

use crate::settings::Settings;
use profsync_engine::{ChangeKind, ChangeWatcher};
use std::sync::mpsc;
use std::time::Duration;

/// Runs the watch command: prints every debounced change event for the
/// configured targets until interrupted.
pub fn run(settings: &Settings, debounce_ms: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = settings.sync_config();
    if let Some(ms) = debounce_ms {
        config = config.with_debounce(Duration::from_millis(ms));
    }

    if config.targets.is_empty() {
        return Err("no watch_files configured".into());
    }

    println!(
        "Watching {} target(s) under {:?} (debounce {:?}), Ctrl-C to stop",
        config.targets.len(),
        config.workspace,
        config.debounce
    );

    let (tx, rx) = mpsc::channel();
    let mut watcher = ChangeWatcher::new(&config);
    watcher.start(move |event| {
        let _ = tx.send(event);
    })?;

    for event in rx {
        let kind = match event.kind {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        println!("{kind:<9} {}", event.relative_path);
    }

    Ok(())
}
