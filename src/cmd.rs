//! Command implementations for the CLI interface.
//!
//! Every subcommand runs against a [`Session`], so the same handlers serve the
//! one-shot binary and the interactive shell. Handlers return a printable error
//! instead of exiting; the caller decides whether that ends the process.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use taskforest::directory::{Directory, Kind};
use taskforest::error::TargetError;
use taskforest::fields::*;
use taskforest::persist::{Connection, DirectoryTarget, SyncReport};
use taskforest::task::{Attachment, Recurrence, Task};
use taskforest::tree::Destination;
use taskforest::view::{self, ProjectFilter, Scope, TaskFilter};
use taskforest::{Config, TaskStore};

use crate::display::*;

pub type CmdResult = Result<(), String>;

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Task(TaskCommand),

    /// Interactive session with undo/redo and interval autosave.
    Shell,

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Commands available both one-shot and inside the shell.
#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a new root task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Project name or id. Without it the task goes to the Inbox.
        #[arg(long)]
        project: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, value_enum, default_value_t = Status::Todo)]
        status: Status,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "fri", or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Label name. May be repeated and comma-separated.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Repeat the task when it is completed.
        #[arg(long, value_enum)]
        repeat: Option<RecurrenceKind>,
        /// Repeat interval in days, weeks or months.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        every: u32,
    },

    /// Add a subtask under an existing task.
    Sub {
        /// Parent task id, id prefix or title.
        parent: String,
        title: String,
    },

    /// Update fields on a task.
    Edit {
        /// Task id, id prefix or title.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        /// Clear due date.
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
        /// Add labels. May be repeated and comma-separated.
        #[arg(long = "add-label")]
        add_labels: Vec<String>,
        /// Remove labels. May be repeated and comma-separated.
        #[arg(long = "rm-label")]
        rm_labels: Vec<String>,
        #[arg(long, value_enum)]
        repeat: Option<RecurrenceKind>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        every: Option<u32>,
    },

    /// List tasks with optional filters.
    List {
        /// Include archived (fully completed) roots.
        #[arg(long, conflicts_with = "archive")]
        all: bool,
        /// Show only the notebook of fully completed roots.
        #[arg(long)]
        archive: bool,
        /// Filter by project name or id.
        #[arg(long, conflicts_with = "inbox")]
        project: Option<String>,
        /// Only tasks without a project.
        #[arg(long)]
        inbox: bool,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by label. May be repeated; any shared label matches.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Search titles, descriptions and notes at every depth.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = SortKey::Manual)]
        sort: SortKey,
        /// Show subtasks indented under their parents.
        #[arg(long)]
        tree: bool,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task with its subtasks, notes and attachments.
    View {
        /// Task id, id prefix or title.
        id: String,
    },

    /// Toggle completion. Completing a repeating task schedules the next one.
    #[command(alias = "toggle")]
    Done {
        /// Task id, id prefix or title.
        id: String,
    },

    /// Set the workflow status of a task.
    Status {
        /// Task id, id prefix or title.
        id: String,
        #[arg(value_enum)]
        status: Status,
    },

    /// Add a note to a task.
    Note {
        /// Task id, id prefix or title.
        id: String,
        text: String,
    },

    /// Attach a file to a task.
    Attach {
        /// Task id, id prefix or title.
        id: String,
        file: PathBuf,
        /// MIME type. Guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },

    /// Delete a task and all of its subtasks.
    Delete {
        /// Task id, id prefix or title.
        id: String,
    },

    /// Move a task under another task or to the root of a project.
    Move {
        /// Task id, id prefix or title.
        id: String,
        /// New parent task.
        #[arg(long, conflicts_with_all = ["root", "project"])]
        parent: Option<String>,
        /// Move to the root level (of the Inbox unless --project is given).
        #[arg(long)]
        root: bool,
        /// Move to the root level of this project.
        #[arg(long)]
        project: Option<String>,
    },

    /// Reorder the children of a task (or the roots) to the given order.
    Reorder {
        /// Parent whose subtasks are reordered. Roots when omitted.
        #[arg(long)]
        parent: Option<String>,
        /// Every sibling, in the new order.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show tasks and notes related to a task.
    Related {
        /// Task id, id prefix or title.
        id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Completion statistics.
    Stats,

    /// Export all tasks to tasks-export-YYYY-MM-DD.json.
    Export {
        /// Output directory.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Replace all tasks with the contents of an exported file.
    Import { file: PathBuf },

    /// Grant a backup directory and write the tasks to it.
    Connect { dir: PathBuf },

    /// Forget the backup directory.
    Disconnect,

    /// Choose when the backup is written.
    Autosave {
        #[arg(value_enum)]
        mode: AutosaveMode,
    },

    /// Write the backup now.
    Save,

    /// Replace all tasks with the backup's contents.
    Load,

    /// Show backup and local cache status.
    Sync,

    /// List, add or remove projects.
    Projects {
        #[command(subcommand)]
        action: Option<DirectoryAction>,
    },

    /// List, add or remove labels.
    Labels {
        #[command(subcommand)]
        action: Option<DirectoryAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DirectoryAction {
    List,
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Remove an entry. Tasks using it are updated.
    Remove { name: String },
}

/// A store plus the project/label directory that names its ids.
pub struct Session {
    pub store: TaskStore,
    pub directory: Directory,
    directory_path: PathBuf,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self, String> {
        config.ensure_data_dir().map_err(|e| e.to_string())?;
        let directory_path = Directory::path_in(&config.data_dir);
        let directory = Directory::load(&directory_path).map_err(|e| format!("Error reading directory: {e}"))?;
        Ok(Session {
            store: TaskStore::open(config),
            directory,
            directory_path,
        })
    }

    /// Print and clear pending persistence notices.
    pub fn report_notices(&mut self) {
        for notice in self.store.take_notices() {
            eprintln!("warning: {notice}");
        }
    }
}

/// Resolve a task identifier (full id, unique id prefix, or title) to an id.
/// Returns an error listing the candidates when the identifier is ambiguous.
pub fn resolve_task(store: &TaskStore, identifier: &str) -> Result<String, String> {
    if store.find(identifier).is_some() {
        return Ok(identifier.to_string());
    }
    let wanted = identifier.trim().to_lowercase();
    let mut by_prefix = Vec::new();
    let mut by_title = Vec::new();
    for root in store.forest() {
        root.walk(&mut |t| {
            if !identifier.is_empty() && t.id.starts_with(identifier) {
                by_prefix.push(t);
            }
            if t.title.to_lowercase() == wanted {
                by_title.push(t);
            }
        });
    }
    let matches = if by_prefix.is_empty() { by_title } else { by_prefix };

    match matches.len() {
        0 => Err(format!("No task found matching '{identifier}'")),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let mut msg = format!("Multiple tasks match '{identifier}':\n");
            for t in matches {
                msg.push_str(&format!("  {}: {} (depth {})\n", short_id(&t.id), t.title, t.depth));
            }
            msg.push_str("Please use a longer id prefix instead.");
            Err(msg)
        }
    }
}

fn resolve_entry(dir: &Directory, kind: Kind, name: &str) -> Result<String, String> {
    dir.resolve(kind, name).ok_or_else(|| {
        let what = if kind == Kind::Project { "projects" } else { "labels" };
        format!("Unknown {}: '{name}'. Add it with `tf {what} add`.", &what[..what.len() - 1])
    })
}

fn resolve_labels(dir: &Directory, inputs: &[String]) -> Result<Vec<String>, String> {
    split_names(inputs)
        .iter()
        .map(|n| resolve_entry(dir, Kind::Label, n))
        .collect()
}

fn parse_due(s: &str) -> Result<chrono::NaiveDate, String> {
    parse_due_input(s).ok_or_else(|| format!("Could not understand due date '{s}'"))
}

fn mode_name(mode: AutosaveMode) -> String {
    mode.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}

/// Run one task command, then let the autosave policy reach the backup.
pub async fn run_command(session: &mut Session, command: TaskCommand) -> CmdResult {
    let result = dispatch(session, command).await;
    session.store.flush().await;
    session.report_notices();
    result
}

async fn dispatch(session: &mut Session, command: TaskCommand) -> CmdResult {
    let Session {
        store,
        directory,
        directory_path,
    } = session;
    match command {
        TaskCommand::Add {
            title,
            desc,
            project,
            priority,
            status,
            due,
            labels,
            repeat,
            every,
        } => {
            let mut task = Task::new(title.trim());
            task.description = desc.unwrap_or_default();
            task.priority = priority;
            task.set_status(status);
            task.due_date = due.as_deref().map(parse_due).transpose()?;
            task.project_id = project
                .as_deref()
                .map(|p| resolve_entry(directory, Kind::Project, p))
                .transpose()?;
            task.label_ids = resolve_labels(directory, &labels)?;
            task.recurrence = repeat.map(|kind| Recurrence { kind, interval: every });
            let id = store.add_task(task).map_err(|e| e.to_string())?;
            println!("Added task {}", short_id(&id));
        }

        TaskCommand::Sub { parent, title } => {
            let parent = resolve_task(store, &parent)?;
            let id = store.add_subtask(&parent, title.trim()).map_err(|e| e.to_string())?;
            println!("Added subtask {}", short_id(&id));
        }

        TaskCommand::Edit {
            id,
            title,
            desc,
            priority,
            due,
            clear_due,
            add_labels,
            rm_labels,
            repeat,
            every,
        } => {
            let id = resolve_task(store, &id)?;
            let due = due.as_deref().map(parse_due).transpose()?;
            let add = resolve_labels(directory, &add_labels)?;
            // removed labels may already be gone from the directory
            let rm: Vec<String> = split_names(&rm_labels)
                .into_iter()
                .map(|n| directory.resolve(Kind::Label, &n).unwrap_or(n))
                .collect();
            let changed = store.modify_task(&id, |t| {
                if let Some(title) = title {
                    t.title = title;
                }
                if let Some(desc) = desc {
                    t.description = desc;
                }
                if let Some(p) = priority {
                    t.priority = p;
                }
                if clear_due {
                    t.due_date = None;
                } else if due.is_some() {
                    t.due_date = due;
                }
                t.label_ids.retain(|l| !rm.contains(l));
                for l in add {
                    if !t.label_ids.contains(&l) {
                        t.label_ids.push(l);
                    }
                }
                match (repeat, every) {
                    (Some(RecurrenceKind::None), _) => t.recurrence = None,
                    (Some(kind), every) => {
                        let interval = every.or(t.recurrence.map(|r| r.interval)).unwrap_or(1);
                        t.recurrence = Some(Recurrence { kind, interval });
                    }
                    (None, Some(every)) => {
                        if let Some(r) = t.recurrence.as_mut() {
                            r.interval = every;
                        }
                    }
                    (None, None) => {}
                }
            });
            println!("{} task {}", if changed { "Updated" } else { "No changes to" }, short_id(&id));
        }

        TaskCommand::List {
            all,
            archive,
            project,
            inbox,
            priority,
            labels,
            search,
            sort,
            tree,
            limit,
        } => {
            let scope = match (all, archive) {
                (_, true) => Scope::Archive,
                (true, false) => Scope::All,
                (false, false) => Scope::Active,
            };
            let project = match (project, inbox) {
                (Some(p), _) => ProjectFilter::Project(resolve_entry(directory, Kind::Project, &p)?),
                (None, true) => ProjectFilter::Inbox,
                (None, false) => ProjectFilter::Any,
            };
            let filter = TaskFilter {
                scope,
                project,
                priority,
                labels: resolve_labels(directory, &labels)?,
                search,
            };
            let mut tasks = store.list(&filter, sort);
            if let Some(n) = limit {
                tasks.truncate(n);
            }
            if tasks.is_empty() {
                println!("No tasks.");
            } else {
                print_table(&tasks, directory, tree);
            }
        }

        TaskCommand::View { id } => {
            let id = resolve_task(store, &id)?;
            let task = store.find(&id).ok_or_else(|| format!("Task {id} not found."))?;
            print_task(task, directory);
        }

        TaskCommand::Done { id } => {
            let id = resolve_task(store, &id)?;
            let spawned = store.toggle_complete(&id).map_err(|e| e.to_string())?;
            let done = store.find(&id).is_some_and(|t| t.completed);
            println!("{} task {}", if done { "Completed" } else { "Reopened" }, short_id(&id));
            if let Some(next) = spawned.and_then(|n| store.find(&n)) {
                let due = next.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
                println!("Next occurrence {} due {}", short_id(&next.id), due);
            }
        }

        TaskCommand::Status { id, status } => {
            let id = resolve_task(store, &id)?;
            store.set_status(&id, status);
            println!("Task {} is {}", short_id(&id), format_status(status));
        }

        TaskCommand::Note { id, text } => {
            let id = resolve_task(store, &id)?;
            store.add_note(&id, &text).map_err(|e| e.to_string())?;
            println!("Added note to {}", short_id(&id));
        }

        TaskCommand::Attach { id, file, mime } => {
            let id = resolve_task(store, &id)?;
            let bytes = tokio::fs::read(&file)
                .await
                .map_err(|e| format!("Error reading {}: {e}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".into());
            let mime = mime.unwrap_or_else(|| guess_mime(&name).to_string());
            let size = bytes.len();
            store
                .add_attachment(&id, Attachment::from_bytes(name.as_str(), mime, &bytes))
                .map_err(|e| e.to_string())?;
            println!("Attached {name} ({size} bytes) to {}", short_id(&id));
        }

        TaskCommand::Delete { id } => {
            let id = resolve_task(store, &id)?;
            if !store.delete_task(&id) {
                return Err(format!("Task {id} not found."));
            }
            println!("Deleted task {}", short_id(&id));
        }

        TaskCommand::Move {
            id,
            parent,
            root,
            project,
        } => {
            let id = resolve_task(store, &id)?;
            let dest = match parent {
                Some(p) => Destination::Under(resolve_task(store, &p)?),
                None if root || project.is_some() => Destination::Root {
                    project_id: project
                        .as_deref()
                        .map(|p| resolve_entry(directory, Kind::Project, p))
                        .transpose()?,
                },
                None => return Err("Give --parent, --root or --project.".into()),
            };
            store.move_task(&id, dest).map_err(|e| e.to_string())?;
            println!("Moved task {}", short_id(&id));
        }

        TaskCommand::Reorder { parent, ids } => {
            let parent = parent.map(|p| resolve_task(store, &p)).transpose()?;
            let order = ids
                .iter()
                .map(|i| resolve_task(store, i))
                .collect::<Result<Vec<_>, _>>()?;
            store.reorder(parent.as_deref(), &order).map_err(|e| e.to_string())?;
            println!("Reordered {} tasks", order.len());
        }

        TaskCommand::Related { id, limit } => {
            let id = resolve_task(store, &id)?;
            let related = store.related(&id).unwrap_or_default();
            if related.is_empty() {
                println!("Nothing related.");
            }
            for (entry, score) in related.into_iter().take(limit) {
                let kind = if store.find(&entry.id).is_some() { "task" } else { "note" };
                println!(
                    "{score:>3}  {:<4} {:<8} {}: {}",
                    kind,
                    short_id(&entry.id),
                    truncate(&entry.title, 40),
                    truncate(&entry.content, 60)
                );
            }
        }

        TaskCommand::Stats => {
            let c = store.completion();
            let pct = if c.total == 0 { 0 } else { c.completed * 100 / c.total };
            println!("Tasks:      {} ({} completed, {pct}%)", c.total, c.completed);
            println!("Active:     {} roots", view::active_view(store.forest()).len());
            println!("Notebook:   {} roots", view::archive_view(store.forest()).len());
            let today = Local::now().date_naive();
            let mut overdue = 0;
            for root in store.forest() {
                root.walk(&mut |t| {
                    if !t.completed && t.due_date.is_some_and(|d| d < today) {
                        overdue += 1;
                    }
                });
            }
            println!("Overdue:    {overdue}");
        }

        TaskCommand::Export { dir } => {
            let path = store.export_to(&dir).map_err(|e| format!("Export failed: {e}"))?;
            println!("Exported {} tasks to {}", store.completion().total, path.display());
        }

        TaskCommand::Import { file } => {
            let roots = store.import_file(&file).map_err(|e| format!("Import failed: {e}"))?;
            println!("Imported {roots} root tasks from {}", file.display());
        }

        TaskCommand::Connect { dir } => {
            let target = DirectoryTarget::grant(&dir).await.map_err(|e| e.to_string())?;
            let path = target.file_path();
            store.connect(Arc::new(target)).await.map_err(|e| e.to_string())?;
            println!("Connected. Backup written to {}", path.display());
        }

        TaskCommand::Disconnect => {
            store.disconnect();
            println!("Backup disconnected.");
        }

        TaskCommand::Autosave { mode } => {
            store.set_autosave(mode);
            println!("Autosave: {}", mode_name(mode));
        }

        TaskCommand::Save => match store.save_now().await {
            Ok(()) => println!("Backup saved."),
            Err(TargetError::NotConnected) => return Err(not_connected(&store.sync_report())),
            Err(e) => return Err(e.to_string()),
        },

        TaskCommand::Load => match store.load_now().await {
            Ok(true) => println!("Loaded {} tasks from backup.", store.completion().total),
            Ok(false) => println!("The backup is empty; nothing loaded."),
            Err(TargetError::NotConnected) => return Err(not_connected(&store.sync_report())),
            Err(e) => return Err(e.to_string()),
        },

        TaskCommand::Sync => print_report(&store.sync_report()),

        TaskCommand::Projects { action } => {
            let removed = directory_action(directory, Kind::Project, action)?;
            if let Some(id) = removed {
                let moved = store.clear_project(&id);
                println!("Moved {moved} tasks to the Inbox");
            }
            save_directory(directory, directory_path)?;
        }

        TaskCommand::Labels { action } => {
            let removed = directory_action(directory, Kind::Label, action)?;
            if let Some(id) = removed {
                let changed = store.remove_label(&id);
                println!("Removed the label from {changed} tasks");
            }
            save_directory(directory, directory_path)?;
        }
    }
    Ok(())
}

fn save_directory(directory: &Directory, path: &std::path::Path) -> CmdResult {
    directory.save(path).map_err(|e| format!("Error saving directory: {e}"))
}

fn not_connected(report: &SyncReport) -> String {
    match &report.connection {
        Connection::AwaitingGrant { name } => {
            format!("Access to {name} must be granted again. Run `connect {name}`.")
        }
        _ => "No backup location connected. Run `connect <dir>`.".into(),
    }
}

fn print_report(report: &SyncReport) {
    let backup = match &report.connection {
        Connection::Disconnected => "not connected".to_string(),
        Connection::AwaitingGrant { name } => format!("{name} (grant again with `connect`)"),
        Connection::Connected { name } => name.clone(),
    };
    println!("Backup:      {backup}");
    println!("Status:      {}", report.status);
    println!("Autosave:    {}", mode_name(report.autosave));
    println!(
        "Last saved:  {}",
        report
            .last_saved
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!("Local cache: {}", if report.cache_ok { "ok" } else { "failing" });
}

/// Apply a directory action. Returns the id of a removed entry.
fn directory_action(dir: &mut Directory, kind: Kind, action: Option<DirectoryAction>) -> Result<Option<String>, String> {
    match action.unwrap_or(DirectoryAction::List) {
        DirectoryAction::List => {
            if dir.iter(kind).next().is_none() {
                println!("None.");
            }
            for (id, item) in dir.iter(kind) {
                let color = item.color.as_deref().map(|c| format!(" ({c})")).unwrap_or_default();
                println!("{id:<20} {}{color}", item.name);
            }
            Ok(None)
        }
        DirectoryAction::Add { name, color } => {
            let id = dir.add(kind, &name, color).map_err(|e| e.to_string())?;
            println!("Added {id}");
            Ok(None)
        }
        DirectoryAction::Remove { name } => {
            let id = dir.remove(kind, &name).map_err(|e| e.to_string())?;
            println!("Removed {id}");
            Ok(Some(id))
        }
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use taskforest::persist::LocalCache;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        Session {
            store: TaskStore::with_cache(LocalCache::new(dir.path(), "tasks", None), 20, Duration::from_secs(300)),
            directory: Directory::default(),
            directory_path: Directory::path_in(dir.path()),
        }
    }

    #[test]
    fn test_resolve_by_id_prefix_and_title() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let id = s.store.add_task(Task::new("Water plants")).unwrap();
        s.store.add_task(Task::new("Pay rent")).unwrap();
        s.store.add_task(Task::new("pay rent")).unwrap();

        assert_eq!(resolve_task(&s.store, &id).unwrap(), id);
        assert_eq!(resolve_task(&s.store, &id[..8]).unwrap(), id);
        assert_eq!(resolve_task(&s.store, "water PLANTS").unwrap(), id);
        assert!(resolve_task(&s.store, "Pay rent").unwrap_err().contains("Multiple"));
        assert!(resolve_task(&s.store, "nothing").is_err());
    }

    #[tokio::test]
    async fn test_add_with_unknown_project_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let cmd = TaskCommand::Add {
            title: "Plan".into(),
            desc: None,
            project: Some("Garden".into()),
            priority: Priority::Medium,
            status: Status::Todo,
            due: None,
            labels: vec![],
            repeat: None,
            every: 1,
        };
        assert!(run_command(&mut s, cmd).await.is_err());
        assert!(s.store.forest().is_empty());
    }

    #[tokio::test]
    async fn test_removing_project_moves_tasks_to_inbox() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let project = s.directory.add(Kind::Project, "Garden", None).unwrap();
        let mut t = Task::new("Plant tulips");
        t.project_id = Some(project.clone());
        let id = s.store.add_task(t).unwrap();

        let cmd = TaskCommand::Projects {
            action: Some(DirectoryAction::Remove { name: "garden".into() }),
        };
        run_command(&mut s, cmd).await.unwrap();
        assert!(s.store.find(&id).unwrap().project_id.is_none());
        assert!(Directory::load(&Directory::path_in(dir.path())).unwrap().projects.is_empty());
    }

    #[tokio::test]
    async fn test_save_without_connection_explains() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let err = run_command(&mut s, TaskCommand::Save).await.unwrap_err();
        assert!(err.contains("connect"));
    }
}
