//! # tf - taskforest command line
//!
//! A personal task manager for the terminal. Tasks nest up to three levels
//! deep, every change can be undone inside the interactive shell, and the task
//! list is written to a local cache on every change and, optionally, to a
//! backup directory you grant.
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a task and a subtask
//! tf add "Plan trip" --due "next fri"
//! tf sub "Plan trip" "Book flights"
//!
//! # List open work as a tree
//! tf list --tree
//!
//! # Complete a task (repeating tasks schedule their next occurrence)
//! tf done "Book flights"
//!
//! # Keep a backup copy in a synced folder
//! tf shell
//! tf> connect ~/Dropbox/tasks
//! tf> autosave every-5-minutes
//! ```
//!
//! ## Key Commands
//!
//! - `tf add <title>` / `tf sub <parent> <title>` - create tasks
//! - `tf list` - active tasks; `--archive` shows fully completed roots
//! - `tf view <id>` - details with notes collected from every subtask
//! - `tf export` / `tf import <file>` - dated JSON export and validated import
//! - `tf shell` - interactive session with `undo`, `redo` and `history`
//!
//! Data is stored in `~/.taskforest/` unless `--data-dir` or `TASKFOREST_DIR`
//! says otherwise. Ids can be abbreviated to any unique prefix.

use clap::Parser;

mod cli;
mod cmd;
mod display;
mod shell;

use cli::Cli;
use cmd::*;
use taskforest::{logging, Config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Failed to initialise logging: {e}");
    }

    // Commands that don't need the store
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    let config = match Config::load(cli.data_dir.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(data_dir = %config.data_dir.display(), key = %config.storage_key, "config loaded");

    let mut session = match Session::open(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open task store in {}: {e}", config.data_dir.display());
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Completions { .. } => unreachable!("completions handled above"),
        Commands::Shell => {
            if let Err(e) = shell::run_shell(&mut session).await {
                eprintln!("Shell error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Task(command) => {
            if let Err(e) = run_command(&mut session, command).await {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
