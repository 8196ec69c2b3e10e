//! Inspect command implementation.

use crate::settings::Settings;
use profsync_engine::VersionStore;
use serde::Serialize;

/// Ledger inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Ledger file path.
    pub ledger: String,
    /// Workspace root.
    pub workspace: String,
    /// Number of tracked paths.
    pub tracked_paths: usize,
    /// Highest version in the ledger.
    pub max_version: u64,
    /// Tracked entries (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<LedgerEntry>>,
}

/// A single ledger entry.
#[derive(Debug, Serialize)]
pub struct LedgerEntry {
    /// Workspace-relative path.
    pub path: String,
    /// Last known remote version.
    pub version: u64,
}

/// Runs the inspect command.
pub fn run(
    settings: &Settings,
    show_entries: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger_path = settings.ledger_path();
    let store = VersionStore::open(&ledger_path);
    let snapshot = store.snapshot();

    let result = InspectResult {
        ledger: ledger_path.display().to_string(),
        workspace: settings.workspace.display().to_string(),
        tracked_paths: snapshot.len(),
        max_version: snapshot.values().copied().max().unwrap_or(0),
        entries: show_entries.then(|| {
            snapshot
                .iter()
                .map(|(path, version)| LedgerEntry {
                    path: path.clone(),
                    version: *version,
                })
                .collect()
        }),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("profsync Ledger Inspection");
    println!("==========================");
    println!();
    println!("Ledger:    {}", result.ledger);
    println!("Workspace: {}", result.workspace);
    println!();
    println!("Tracked paths: {}", result.tracked_paths);
    println!("Max version:   {}", result.max_version);

    if let Some(entries) = &result.entries {
        println!();
        println!("Entries:");
        for entry in entries {
            println!("  v{:<6} {}", entry.version, entry.path);
        }
    }
}
