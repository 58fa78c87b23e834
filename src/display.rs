//! Formatting and parsing helpers for the command line.

use chrono::{Datelike, Days, Local, Months, NaiveDate};

use taskforest::directory::{Directory, Kind};
use taskforest::fields::{format_priority, format_status};
use taskforest::task::Task;
use taskforest::view::is_fully_completed;

/// Characters of an id shown in tables. Any unique prefix is accepted back.
pub const SHORT_ID: usize = 8;

pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID).unwrap_or(id)
}

/// Parse a due date.
///
/// Supports "today", "tomorrow", "yesterday", "in 3d" / "in 2w" / "in 1m",
/// weekday names ("fri", "next monday") and `YYYY-MM-DD`.
pub fn parse_due_input(s: &str) -> Option<NaiveDate> {
    parse_due_from(s, Local::now().date_naive())
}

pub fn parse_due_from(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        "yesterday" => return today.checked_sub_days(Days::new(1)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        if let Some((idx, _)) = rest.char_indices().last() {
            let (n, unit) = rest.split_at(idx);
            if let Ok(n) = n.trim().parse::<u32>() {
                return match unit {
                    "d" => today.checked_add_days(Days::new(u64::from(n))),
                    "w" => today.checked_add_days(Days::new(7 * u64::from(n))),
                    "m" => today.checked_add_months(Months::new(n)),
                    _ => None,
                };
            }
        }
    }

    let weekdays = [
        ("monday", "mon"),
        ("tuesday", "tue"),
        ("wednesday", "wed"),
        ("thursday", "thu"),
        ("friday", "fri"),
        ("saturday", "sat"),
        ("sunday", "sun"),
    ];
    let (next, day) = match s.strip_prefix("next ") {
        Some(rest) => (true, rest),
        None => (false, s.as_str()),
    };
    if let Some(target) = weekdays.iter().position(|(long, short)| day == *long || day == *short) {
        let current = today.weekday().num_days_from_monday() as u64;
        let mut ahead = (target as u64 + 7 - current) % 7;
        if next {
            ahead += 7;
        }
        return today.checked_add_days(Days::new(ahead));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let days = (d - today).num_days();
            if days == 0 {
                "today".into()
            } else if days == 1 {
                "tomorrow".into()
            } else if days > 1 {
                format!("in {days}d")
            } else {
                format!("{}d late", -days)
            }
        }
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Split comma-separated inputs into trimmed, non-empty, deduplicated names.
pub fn split_names(inputs: &[String]) -> Vec<String> {
    let mut out: Vec<String> = inputs
        .iter()
        .flat_map(|raw| raw.split(','))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Best-effort MIME type from a file extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn print_row(t: &Task, dir: &Directory, indent: usize, today: NaiveDate) {
    let labels = if t.label_ids.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = t.label_ids.iter().map(|l| dir.name_of(Kind::Label, l)).collect();
        format!(" [{}]", names.join(","))
    };
    let project = t
        .project_id
        .as_deref()
        .map(|p| dir.name_of(Kind::Project, p))
        .unwrap_or("Inbox");
    let repeat = if t.is_recurring() { " ↻" } else { "" };
    println!(
        "{:<8} {:<11} {:<7} {:<10} {:<14} {}{}{}{}",
        short_id(&t.id),
        format_status(t.status),
        format_priority(t.priority),
        format_due_relative(t.due_date, today),
        truncate(project, 14),
        "  ".repeat(indent),
        t.title,
        repeat,
        labels
    );
}

/// Print tasks as a table. With `tree`, subtasks are printed indented under
/// their parents.
pub fn print_table(tasks: &[Task], dir: &Directory, tree: bool) {
    println!(
        "{:<8} {:<11} {:<7} {:<10} {:<14} {}",
        "ID", "Status", "Pri", "Due", "Project", "Title [labels]"
    );
    let today = Local::now().date_naive();
    fn walk(t: &Task, dir: &Directory, indent: usize, today: NaiveDate, tree: bool) {
        print_row(t, dir, indent, today);
        if tree {
            for c in &t.sub_tasks {
                walk(c, dir, indent + 1, today, tree);
            }
        }
    }
    for t in tasks {
        walk(t, dir, 0, today, tree);
    }
}

/// Print the full detail of one task.
pub fn print_task(task: &Task, dir: &Directory) {
    let today = Local::now().date_naive();
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", format_status(task.status));
    println!("Priority:     {}", format_priority(task.priority));
    println!(
        "Project:      {}",
        task.project_id.as_deref().map(|p| dir.name_of(Kind::Project, p)).unwrap_or("Inbox")
    );
    println!(
        "Due:          {}",
        match task.due_date {
            Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!("Depth:        {}", task.depth);
    println!("Parent:       {}", task.parent_id.as_deref().unwrap_or("-"));
    if let Some(r) = task.recurrence.filter(|r| r.is_active()) {
        println!("Repeats:      every {} {:?}", r.interval, r.kind);
    }
    if !task.label_ids.is_empty() {
        let names: Vec<&str> = task.label_ids.iter().map(|l| dir.name_of(Kind::Label, l)).collect();
        println!("Labels:       {}", names.join(", "));
    }
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    if task.depth == 0 && is_fully_completed(task) {
        println!("Archived:     yes (in the notebook)");
    }
    println!(
        "Description:\n{}\n",
        if task.description.is_empty() { "-" } else { task.description.as_str() }
    );

    if !task.sub_tasks.is_empty() {
        println!("Subtasks:");
        fn dfs(t: &Task, depth: usize) {
            for c in &t.sub_tasks {
                println!("{}- {} [{}] (#{})", "  ".repeat(depth), c.title, format_status(c.status), short_id(&c.id));
                dfs(c, depth + 1);
            }
        }
        dfs(task, 1);
    }

    let notes = taskforest::view::collect_notes(task);
    if !notes.is_empty() {
        println!("Notes:");
        for n in notes {
            let origin = if n.origin_task_id == task.id {
                String::new()
            } else {
                format!(" (from {})", n.origin_task_title)
            };
            println!("  {} {}{}", n.created_at.format("%Y-%m-%d %H:%M"), n.content, origin);
        }
    }

    if !task.attachments.is_empty() {
        println!("Attachments:");
        for a in &task.attachments {
            println!("  {} ({}, {} bytes)", a.name, a.mime_type, a.size);
        }
    }
}
