use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Personal task manager with nested subtasks, undo/redo and backups.
/// Storage defaults to ~/.taskforest or a directory passed via --data-dir.
#[derive(Parser)]
#[command(name = "tf", version, about = "Nested task manager with undo/redo and backups")]
pub struct Cli {
    /// Directory holding the local cache, settings and config.json.
    /// Falls back to $TASKFOREST_DIR, then ~/.taskforest.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// More log output on stderr. Repeat for more detail.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}
