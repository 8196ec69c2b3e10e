//! Verify command implementation.

use crate::settings::Settings;
use profsync_engine::VersionStore;
use std::collections::BTreeSet;
use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Paths tracked by the ledger.
    pub tracked: usize,
    /// Tracked paths present in the workspace.
    pub present: usize,
    /// Tracked paths missing from the workspace.
    pub missing_locally: Vec<String>,
    /// Workspace files under watch targets the ledger has never seen.
    pub untracked: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.missing_locally.is_empty()
    }
}

/// Runs the verify command.
///
/// Untracked files are informational (they sync on their next edit);
/// tracked-but-missing files indicate local state fell behind the ledger
/// and a pull is needed.
pub fn run(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying workspace at {:?}", settings.workspace);
    println!();

    let store = VersionStore::open(settings.ledger_path());
    let snapshot = store.snapshot();

    let mut result = VerifyResult {
        tracked: snapshot.len(),
        present: 0,
        missing_locally: Vec::new(),
        untracked: Vec::new(),
    };

    for path in snapshot.keys() {
        if settings.workspace.join(path).is_file() {
            result.present += 1;
        } else {
            result.missing_locally.push(path.clone());
        }
    }

    let tracked: BTreeSet<&String> = snapshot.keys().collect();
    for target in settings.sync_config().targets {
        let absolute = settings.workspace.join(target.relative_path());
        if target.is_subtree() {
            collect_files(&absolute, &settings.workspace, &mut |relative| {
                if !tracked.contains(&relative) {
                    result.untracked.push(relative);
                }
            })?;
        } else if absolute.is_file() && !tracked.contains(&target.relative_path().to_string()) {
            result.untracked.push(target.relative_path().to_string());
        }
    }

    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Workspace verification passed");
        Ok(())
    } else {
        println!("✗ Workspace verification failed (pull to restore missing files)");
        Err("Verification failed".into())
    }
}

fn print_result(result: &VerifyResult) {
    println!("Tracked paths:   {}", result.tracked);
    println!("Present locally: {}", result.present);

    if !result.missing_locally.is_empty() {
        println!();
        println!("Missing locally:");
        for path in &result.missing_locally {
            println!("  {path}");
        }
    }

    if !result.untracked.is_empty() {
        println!();
        println!("Untracked (will sync on next edit):");
        for path in &result.untracked {
            println!("  {path}");
        }
    }
}

/// Walks a directory tree, reporting each file as a `/`-separated
/// workspace-relative path.
fn collect_files(
    dir: &Path,
    workspace: &Path,
    report: &mut impl FnMut(String),
) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, workspace, report)?;
        } else if let Ok(relative) = path.strip_prefix(workspace) {
            let parts: Vec<&str> = relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect();
            if !parts.is_empty() {
                report(parts.join("/"));
            }
        }
    }
    Ok(())
}
