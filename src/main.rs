//! # studio - Wedding production workflow CLI
//!
//! A command-line tracker for a wedding photo and film studio. Each project
//! buys a service formula; the formula expands into dated production tasks
//! across four poles (photo, film, album/DVD, communication), and completing
//! tasks moves each pole's progress counter forward.
//!
//! ## Key Features
//!
//! - **Workflow Catalog**: Built-in formulas with operator overrides, editable from the CLI
//! - **Task Generation**: Deadlines, phase and priority derived from each step's day offset
//! - **Progress Reconciliation**: Completing a task advances its pole, never backwards
//! - **Local-first Catalog Edits**: Saved to a local cache before the shared database
//! - **Production Board**: Terminal UI with one gauge per pole
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a project and generate its tasks
//! studio project add "Martin & Lucas" --date 2025-03-01 --formula "Photo + Film long"
//! studio inject "Martin & Lucas"
//!
//! # Tick off a step
//! studio step "Martin & Lucas" photo "Client gallery upload"
//!
//! # See what is late, or open the board
//! studio overdue
//! studio board
//! ```
//!
//! ## Key Commands
//!
//! - `studio project add|list|view` - Manage wedding projects
//! - `studio inject <project>` - Generate tasks from the project's formula
//! - `studio complete <task>` / `studio reopen <task>` - Change task status
//! - `studio catalog show <formula>` - Inspect a formula's steps
//! - `studio catalog add-step|update-step|remove-step` - Edit the catalog
//! - `studio reconcile <project>` - Repair pole counters from completed tasks
//!
//! Data is stored locally in `~/.studio/` (override with `--data-dir`,
//! `STUDIO_DATA_DIR` or `studio.toml`). Logging goes to stderr; set
//! `RUST_LOG=debug` for details.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod fields;
pub mod generator;
pub mod progress;
pub mod project;
pub mod reconciler;
pub mod store;
pub mod task;
pub mod telemetry;
pub mod tui {
    pub mod colors;
    pub mod workflow;
    pub mod workflow_run;
}

use cli::Cli;
use cmd::{cmd_completions, Commands, Workspace};
use config::StudioConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Completions need neither configuration nor storage.
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = StudioConfig::load(cli.data_dir.as_deref())?;
    telemetry::init_logging(&config.log_level);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    debug!(db = %db_path.display(), data_dir = %config.data_dir.display(), "Opening workspace");

    let ws = Workspace::open(config, &db_path)?;
    cmd::run(ws, cli.command)
}
