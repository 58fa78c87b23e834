//! Derived views over the forest.
//!
//! Nothing here is cached: every view is computed from the forest it is given,
//! so a view can never lag behind a mutation.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::fields::{Priority, SortKey};
use crate::task::{Note, Task};

/// Project scope of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProjectFilter {
    #[default]
    Any,
    /// Tasks with no project.
    Inbox,
    Project(String),
}

/// Which part of the forest a list draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Roots that still have open work.
    #[default]
    Active,
    /// Fully completed roots (the notebook).
    Archive,
    All,
}

/// Composable list filter. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub scope: Scope,
    pub project: ProjectFilter,
    pub priority: Option<Priority>,
    /// Match when the task shares at least one of these labels.
    pub labels: Vec<String>,
    pub search: Option<String>,
}

impl TaskFilter {
    fn keeps(&self, task: &Task) -> bool {
        let project_ok = match &self.project {
            ProjectFilter::Any => true,
            ProjectFilter::Inbox => task.project_id.is_none(),
            ProjectFilter::Project(p) => task.project_id.as_deref() == Some(p.as_str()),
        };
        let priority_ok = self.priority.map_or(true, |p| task.priority == p);
        let labels_ok = self.labels.is_empty() || task.label_ids.iter().any(|l| self.labels.contains(l));
        project_ok && priority_ok && labels_ok
    }
}

/// Whether the task and all of its descendants are completed.
pub fn is_fully_completed(task: &Task) -> bool {
    task.completed && task.sub_tasks.iter().all(is_fully_completed)
}

/// Roots with at least one open node anywhere in their subtree.
pub fn active_view(forest: &[Task]) -> Vec<&Task> {
    forest.iter().filter(|t| !is_fully_completed(t)).collect()
}

/// Roots whose whole subtree is completed.
pub fn archive_view(forest: &[Task]) -> Vec<&Task> {
    forest.iter().filter(|t| is_fully_completed(t)).collect()
}

/// Case-insensitive match on the task's own title, description or notes.
pub fn matches_text(task: &Task, needle_lower: &str) -> bool {
    task.title.to_lowercase().contains(needle_lower)
        || task.description.to_lowercase().contains(needle_lower)
        || task.notes.iter().any(|n| n.content.to_lowercase().contains(needle_lower))
}

fn subtree_matches(task: &Task, needle_lower: &str) -> bool {
    matches_text(task, needle_lower) || task.sub_tasks.iter().any(|c| subtree_matches(c, needle_lower))
}

/// Recursive search over roots.
///
/// A root matching directly comes back whole. A root that only matches through a
/// descendant comes back with its subtask list emptied.
pub fn search<'a>(roots: impl IntoIterator<Item = &'a Task>, query: &str) -> Vec<Task> {
    let needle = query.to_lowercase();
    roots
        .into_iter()
        .filter_map(|t| {
            if matches_text(t, &needle) {
                Some(t.clone())
            } else if t.sub_tasks.iter().any(|c| subtree_matches(c, &needle)) {
                let mut flat = t.clone();
                flat.sub_tasks.clear();
                Some(flat)
            } else {
                None
            }
        })
        .collect()
}

/// Apply scope, predicates and search, then sort.
pub fn apply(forest: &[Task], filter: &TaskFilter, sort: SortKey) -> Vec<Task> {
    let scoped: Vec<&Task> = match filter.scope {
        Scope::Active => active_view(forest),
        Scope::Archive => archive_view(forest),
        Scope::All => forest.iter().collect(),
    };
    let kept = scoped.into_iter().filter(|t| filter.keeps(t));
    let mut out = match filter.search.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => search(kept, q),
        _ => kept.cloned().collect(),
    };
    sort_tasks(&mut out, sort);
    out
}

/// Stable sort. Tasks without a due date always go last.
pub fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    fn due_key(d: Option<NaiveDate>) -> (bool, NaiveDate) {
        (d.is_none(), d.unwrap_or(NaiveDate::MIN))
    }
    match key {
        SortKey::Manual => {}
        SortKey::Priority => tasks.sort_by_key(|t| t.priority.rank()),
        SortKey::DueAsc => tasks.sort_by_key(|t| due_key(t.due_date)),
        SortKey::DueDesc => tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (x, y) => x.is_none().cmp(&y.is_none()),
        }),
    }
}

/// Notes of `task` and all of its descendants, depth-first, origin tags intact.
pub fn collect_notes(task: &Task) -> Vec<&Note> {
    let mut notes = Vec::new();
    task.walk(&mut |t| notes.extend(t.notes.iter()));
    notes
}

// ── Relatedness ─────────────────────────────────────────────────────

/// A task or note as seen by the notebook's cross-reference panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub project_id: Option<String>,
    pub label_ids: Vec<String>,
}

impl Entry {
    pub fn from_task(task: &Task) -> Self {
        Entry {
            id: task.id.clone(),
            title: task.title.clone(),
            content: task.description.clone(),
            project_id: task.project_id.clone(),
            label_ids: task.label_ids.clone(),
        }
    }

    /// Notes take their project and labels from the task they hang off.
    pub fn from_note(note: &Note, owner: &Task) -> Self {
        Entry {
            id: note.id.clone(),
            title: note.origin_task_title.clone(),
            content: note.content.clone(),
            project_id: owner.project_id.clone(),
            label_ids: owner.label_ids.clone(),
        }
    }
}

/// Lowercased words longer than three characters, punctuation removed.
pub fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// 2 per shared keyword, 3 for a shared project, 2 per shared label.
pub fn relatedness(a: &Entry, b: &Entry) -> u32 {
    let ka = keywords(&format!("{} {}", a.title, a.content));
    let kb = keywords(&format!("{} {}", b.title, b.content));
    let shared_words = ka.intersection(&kb).count() as u32;
    let same_project = matches!((&a.project_id, &b.project_id), (Some(x), Some(y)) if x == y);
    let la: HashSet<&String> = a.label_ids.iter().collect();
    let shared_labels = b.label_ids.iter().filter(|l| la.contains(l)).count() as u32;
    let project_bonus = if same_project { 3 } else { 0 };
    2 * shared_words + project_bonus + 2 * shared_labels
}

/// Candidates related to `target`, best first. Ties keep input order.
pub fn related<'a>(target: &Entry, candidates: &'a [Entry]) -> Vec<(&'a Entry, u32)> {
    let mut scored: Vec<(&Entry, u32)> = candidates
        .iter()
        .filter(|c| c.id != target.id)
        .map(|c| (c, relatedness(target, c)))
        .filter(|(_, s)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
}

/// Every task and note in the forest as notebook entries.
pub fn notebook_entries(forest: &[Task]) -> Vec<Entry> {
    let mut out = Vec::new();
    for root in forest {
        root.walk(&mut |t| {
            out.push(Entry::from_task(t));
            out.extend(t.notes.iter().map(|n| Entry::from_note(n, t)));
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Status;

    fn done(mut t: Task) -> Task {
        t.set_status(Status::Done);
        t
    }

    fn completed_family() -> Task {
        let root = Task::new("Move house");
        let a = done(root.child("Pack books"));
        let b = done(root.child("Book van"));
        let mut root = done(root);
        root.sub_tasks = vec![a, b];
        root
    }

    #[test]
    fn test_fully_completed_tree_leaves_active_view() {
        let forest = vec![completed_family(), Task::new("open")];
        let active: Vec<&str> = active_view(&forest).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(active, vec!["open"]);
        assert_eq!(archive_view(&forest)[0].title, "Move house");
    }

    #[test]
    fn test_reopening_a_subtask_restores_active() {
        let mut forest = vec![completed_family()];
        forest[0].sub_tasks[1].set_status(Status::Todo);
        assert_eq!(active_view(&forest).len(), 1);
        assert!(archive_view(&forest).is_empty());
    }

    #[test]
    fn test_search_matches_deep_descendant_and_flattens() {
        let root = Task::new("Garden");
        let mut mid = root.child("Beds");
        let mut deep = mid.child("Buy compost");
        deep.description = "the Peat-free kind".into();
        mid.sub_tasks.push(deep);
        let mut root = root;
        root.sub_tasks.push(mid);
        let forest = vec![root, Task::new("Taxes")];

        let hits = search(&forest, "peat-FREE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Garden");
        assert!(hits[0].sub_tasks.is_empty());
        assert!(search(&forest, "garden")[0].sub_tasks.len() == 1);
    }

    #[test]
    fn test_search_reads_note_content() {
        let mut t = Task::new("Call bank");
        let note = Note::new("ask about IBAN", &t);
        t.notes.push(note);
        let forest = vec![t];
        assert_eq!(search(&forest, "iban").len(), 1);
        assert!(search(&forest, "mortgage").is_empty());
    }

    #[test]
    fn test_filter_composes() {
        let mut a = Task::new("a");
        a.project_id = Some("work".into());
        a.priority = Priority::High;
        a.label_ids = vec!["l1".into()];
        let mut b = Task::new("b");
        b.priority = Priority::High;
        let forest = vec![a, b];

        let f = TaskFilter {
            project: ProjectFilter::Project("work".into()),
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert_eq!(apply(&forest, &f, SortKey::Manual).len(), 1);

        let inbox = TaskFilter { project: ProjectFilter::Inbox, ..Default::default() };
        assert_eq!(apply(&forest, &inbox, SortKey::Manual)[0].title, "b");

        let labels = TaskFilter { labels: vec!["l2".into(), "l1".into()], ..Default::default() };
        assert_eq!(apply(&forest, &labels, SortKey::Manual)[0].title, "a");
    }

    #[test]
    fn test_due_sort_puts_unset_last_both_ways() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 1, day);
        let mut tasks: Vec<Task> = [None, d(3), d(1), None, d(2)]
            .into_iter()
            .enumerate()
            .map(|(i, due)| {
                let mut t = Task::new(i.to_string());
                t.due_date = due;
                t
            })
            .collect();

        sort_tasks(&mut tasks, SortKey::DueAsc);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["2", "4", "1", "0", "3"]);

        sort_tasks(&mut tasks, SortKey::DueDesc);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["1", "4", "2", "0", "3"]);
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let mut tasks: Vec<Task> = [Priority::Low, Priority::Urgent, Priority::Low, Priority::High]
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let mut t = Task::new(i.to_string());
                t.priority = p;
                t
            })
            .collect();
        sort_tasks(&mut tasks, SortKey::Priority);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["1", "3", "0", "2"]);
    }

    #[test]
    fn test_collect_notes_keeps_origin() {
        let mut root = Task::new("root");
        let mut child = root.child("child");
        let (n1, n2) = (Note::new("from child", &child), Note::new("from root", &root));
        child.notes.push(n1);
        root.notes.push(n2);
        let child_id = child.id.clone();
        root.sub_tasks.push(child);
        let notes = collect_notes(&root);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].origin_task_id, child_id);
        assert_eq!(notes[1].origin_task_title, "child");
    }

    #[test]
    fn test_keywords_strip_punctuation_and_short_words() {
        let k = keywords("Fix the Parser, quickly! a bug");
        assert!(k.contains("parser"));
        assert!(k.contains("quickly"));
        assert!(!k.contains("the"));
        assert!(!k.contains("bug"));
    }

    #[test]
    fn test_relatedness_ranking() {
        let entry = |id: &str, title: &str, project: Option<&str>, labels: &[&str]| Entry {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            project_id: project.map(Into::into),
            label_ids: labels.iter().map(|s| s.to_string()).collect(),
        };
        let target = entry("t", "refactor parser module", Some("p"), &["rust"]);
        let candidates = vec![
            entry("a", "parser tests", None, &[]),                 // 2
            entry("b", "unrelated", None, &[]),                    // 0
            entry("c", "module parser", Some("p"), &["rust"]),     // 4 + 3 + 2
            entry("d", "parser docs", None, &[]),                  // 2, after a
            entry("t", "refactor parser module", Some("p"), &[]),  // self, skipped
        ];
        let ranked: Vec<(&str, u32)> = related(&target, &candidates).into_iter().map(|(e, s)| (e.id.as_str(), s)).collect();
        assert_eq!(ranked, vec![("c", 9), ("a", 2), ("d", 2)]);
    }
}
