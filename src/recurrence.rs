//! Completion toggling and recurring-task spawning.

use chrono::{Days, Months, NaiveDate, Utc};

use crate::fields::{RecurrenceKind, Status};
use crate::task::{new_id, Recurrence, Task};
use crate::tree::{find_by_id, modify_by_id, relink, siblings_mut, Forest};

/// Next due date: `interval` periods after `from`. Month steps clamp to the
/// last day of the target month.
pub fn next_due(rule: Recurrence, from: NaiveDate) -> Option<NaiveDate> {
    let n = rule.interval.max(1);
    match rule.kind {
        RecurrenceKind::None => None,
        RecurrenceKind::Daily => from.checked_add_days(Days::new(u64::from(n))),
        RecurrenceKind::Weekly => from.checked_add_days(Days::new(7 * u64::from(n))),
        RecurrenceKind::Monthly => from.checked_add_months(Months::new(n)),
    }
}

/// Copy of a subtask for the next occurrence: fresh ids, open, no notes.
fn reset_template(task: &Task) -> Task {
    let mut t = task.clone();
    t.id = new_id();
    t.notes.clear();
    t.set_status(Status::Todo);
    t.created_at = Utc::now();
    for a in &mut t.attachments {
        a.id = new_id();
    }
    t.sub_tasks = task.sub_tasks.iter().map(reset_template).collect();
    t
}

/// Build the next occurrence of `original`, due on `due`. It keeps the
/// recurrence rule so the chain continues.
pub fn spawn_next(original: &Task, due: NaiveDate) -> Task {
    let mut next = reset_template(original);
    next.due_date = Some(due);
    relink(&mut next);
    next
}

/// Flip a task between done and todo.
///
/// Completing a recurring task also clears its rule and puts the next
/// occurrence at the front of its sibling list. Returns the new forest and the
/// id of the spawned task, or `None` if `id` is unknown.
pub fn toggle_completion(forest: &[Task], id: &str, today: NaiveDate) -> Option<(Forest, Option<String>)> {
    let task = find_by_id(forest, id)?;

    let spawn = match task.recurrence {
        Some(rule) if !task.completed && rule.is_active() => {
            next_due(rule, task.due_date.unwrap_or(today)).map(|due| spawn_next(task, due))
        }
        _ => None,
    };

    let Some(next) = spawn else {
        let target = if task.completed { Status::Todo } else { Status::Done };
        return modify_by_id(forest, id, |t| t.set_status(target)).map(|f| (f, None));
    };

    let parent = task.parent_id.clone();
    let next_id = next.id.clone();
    let mut out = modify_by_id(forest, id, |t| {
        t.set_status(Status::Done);
        t.recurrence = None;
    })?;
    siblings_mut(&mut out, parent.as_deref())?.insert(0, next);
    tracing::debug!(task = id, next = %next_id, "spawned next occurrence");
    Some((out, Some(next_id)))
}
