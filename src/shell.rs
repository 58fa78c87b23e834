//! Interactive shell: one live store, undo/redo, and the interval autosave timer.
//!
//! The loop waits on either the next input line or the next autosave tick. The
//! wait is the only thing `select!` races; the chosen handler then runs to
//! completion, so a backup write is never cut short by incoming input.

use std::io::Write;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use taskforest::persist::SyncStatus;
use taskforest::tree::count_completion;

use crate::cmd::{run_command, Session, TaskCommand};

#[derive(Parser, Debug)]
#[command(name = "tf", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Step back one change.
    Undo,
    /// Re-apply an undone change.
    Redo,
    /// Show the undo history.
    History,
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
    #[command(flatten)]
    Task(TaskCommand),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Split a command line into words. Single and double quotes group words and
/// a backslash escapes the next character.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (_, '\\') => {
                let escaped = chars.next().ok_or("trailing backslash")?;
                current.push(escaped);
                in_word = true;
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unclosed {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn prompt(session: &Session) -> std::io::Result<()> {
    let marker = match session.store.sync_report().status {
        SyncStatus::Pending => "*",
        SyncStatus::AwaitingGrant => "?",
        _ => "",
    };
    let mut out = std::io::stdout();
    write!(out, "tf{marker}> ")?;
    out.flush()
}

fn print_history(session: &Session) {
    let (entries, cursor) = session.store.history();
    if entries.is_empty() {
        println!("No history yet.");
        return;
    }
    for (i, snap) in entries.iter().enumerate() {
        let marker = if i == cursor { "*" } else { " " };
        println!(
            "{marker} {i:>2}  {}  {} tasks",
            snap.taken_at().with_timezone(&Local).format("%H:%M:%S"),
            count_completion(snap.forest()).total
        );
    }
}

async fn handle_line(session: &mut Session, line: &str) -> Flow {
    let words = match split_line(line) {
        Ok(w) if w.is_empty() => return Flow::Continue,
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {e}");
            return Flow::Continue;
        }
    };
    let parsed = match ShellLine::try_parse_from(words) {
        Ok(p) => p,
        Err(e) => {
            // also covers `help`
            let _ = e.print();
            return Flow::Continue;
        }
    };

    match parsed.command {
        ShellCommand::Quit => return Flow::Quit,
        ShellCommand::History => print_history(session),
        ShellCommand::Undo => {
            if session.store.undo() {
                println!("Undone.");
                session.store.flush().await;
            } else {
                println!("Nothing to undo.");
            }
        }
        ShellCommand::Redo => {
            if session.store.redo() {
                println!("Redone.");
                session.store.flush().await;
            } else {
                println!("Nothing to redo.");
            }
        }
        ShellCommand::Task(cmd) => {
            if let Err(e) = run_command(session, cmd).await {
                eprintln!("Error: {e}");
            }
        }
    }
    session.report_notices();
    Flow::Continue
}

/// Run the interactive loop until `quit` or end of input.
pub async fn run_shell(session: &mut Session) -> std::io::Result<()> {
    println!("taskforest shell. Type `help` for commands, `quit` to leave.");
    session.report_notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut prompt_shown = false;

    loop {
        if !prompt_shown {
            prompt(session)?;
            prompt_shown = true;
        }
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                prompt_shown = false;
                if handle_line(session, &line).await == Flow::Quit {
                    break;
                }
            }
            _ = session.store.next_autosave_tick() => {
                session.store.run_autosave().await;
                session.report_notices();
            }
        }
    }

    if session.store.sync_report().status == SyncStatus::Pending {
        eprintln!("warning: the backup has unsaved changes; they are kept in the local cache.");
    }
    Ok(())
}
