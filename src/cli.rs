use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Production workflow tracker for a wedding photo and film studio.
/// Storage defaults to ~/.studio/studio.json; see `studio.toml` in the data directory.
#[derive(Parser)]
#[command(name = "studio", version, about = "Wedding production workflow CLI")]
pub struct Cli {
    /// Path to the JSON database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory holding the database, catalog cache and studio.toml.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
