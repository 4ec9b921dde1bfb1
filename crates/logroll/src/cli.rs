//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logroll")]
#[command(version, about = "Pipe output into rolling, pruned, compressed log files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: logroll.toml/.yaml/.json in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy stdin into a rolling log file
    Write(WriteArgs),

    /// Apply the retention policy to existing backups
    Prune(PruneArgs),

    /// List the backups of a log file
    List {
        /// Base path of the log file
        path: Option<PathBuf>,
    },
}

/// Rotation policy flags; each overrides the config file
#[derive(Args, Default)]
pub struct RotationArgs {
    /// Roll when the active file would exceed this size (e.g. 10MB)
    #[arg(long, value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Delete backups older than this many days
    #[arg(long)]
    pub max_age: Option<u64>,

    /// Keep at most this many backups
    #[arg(long)]
    pub max_backups: Option<usize>,

    /// Gzip backups after rolling
    #[arg(long)]
    pub compress: bool,

    /// strftime suffix for the active file name (e.g. ".%Y%m%d")
    #[arg(long)]
    pub time_format: Option<String>,
}

#[derive(Args)]
pub struct WriteArgs {
    /// Base path of the log file
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub rotation: RotationArgs,

    /// Maximum number of queued writes
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Buffered bytes that force a flush (e.g. 64K)
    #[arg(long, value_parser = parse_size)]
    pub flush_threshold: Option<u64>,

    /// Periodic flush interval in milliseconds
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,

    /// Drop lines instead of waiting when the queue is full
    #[arg(long)]
    pub drop_on_full: bool,

    /// Prefix every line with a UTC timestamp
    #[arg(long)]
    pub timestamp: bool,
}

#[derive(Args)]
pub struct PruneArgs {
    /// Base path of the log file
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub rotation: RotationArgs,
}

fn parse_size(s: &str) -> Result<u64, String> {
    logroll_core::parse_size(s).map_err(|e| e.to_string())
}
