//! profsync CLI
//!
//! Command-line tools for profsync workspace management.
//!
//! # Commands
//!
//! - `inspect` - Display version ledger statistics and entries
//! - `verify` - Cross-check the ledger against the workspace
//! - `watch` - Print debounced change events for the configured targets

mod commands;
mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// profsync command-line workspace tools.
#[derive(Parser)]
#[command(name = "profsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults to ./profsync.json)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display version ledger statistics and entries
    Inspect {
        /// Show every tracked path with its version
        #[arg(short, long)]
        entries: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cross-check the ledger against the workspace
    Verify,

    /// Print debounced change events for the configured targets
    Watch {
        /// Override the debounce quiet interval in milliseconds
        #[arg(short, long)]
        debounce_ms: Option<u64>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from("profsync.json"));

    match cli.command {
        Commands::Inspect { entries, format } => {
            let settings = settings::Settings::load(&config_path)?;
            commands::inspect::run(&settings, entries, &format)?;
        }
        Commands::Verify => {
            let settings = settings::Settings::load(&config_path)?;
            commands::verify::run(&settings)?;
        }
        Commands::Watch { debounce_ms } => {
            let settings = settings::Settings::load(&config_path)?;
            commands::watch::run(&settings, debounce_ms)?;
        }
        Commands::Version => {
            println!("profsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
