use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "escr",
    about = "Event-sourced content repository: content graph projection tooling",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Projection configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the projection tables
    Setup,
    /// Drop all projected state and the checkpoint
    Reset,
    /// Apply an event log above the current checkpoint
    Replay(ReplayArgs),
    /// Show checkpoint, content streams and workspaces
    Status,
    /// Run the integrity violation detector
    Check,
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON-lines file with one event envelope per line
    pub events: PathBuf,

    /// Do not register the cache-flushing hook
    #[arg(long)]
    pub no_cache_flush: bool,

    /// Events between two batch completions
    #[arg(long)]
    pub batch_size: Option<usize>,
}
