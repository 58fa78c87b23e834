//! The task store: owns the forest and routes every change through history and
//! persistence.
//!
//! Mutations are synchronous. Each one computes a new forest with the pure
//! functions in `tree`/`recurrence`, and if the result differs from the current
//! forest it is checkpointed, written to the local cache and marked pending for
//! the external target. Call [`TaskStore::flush`] afterwards to let the
//! every-change autosave mode reach the external target.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TargetError, TreeError};
use crate::fields::{AutosaveMode, SortKey, Status};
use crate::history::{History, Snapshot};
use crate::persist::{ExternalTarget, LocalCache, Notice, Reconciler, SyncReport};
use crate::recurrence;
use crate::task::{Attachment, Note, Task};
use crate::transfer;
use crate::tree::{self, Completion, Destination};
use crate::view::{self, Entry, TaskFilter};

#[derive(Debug)]
pub struct TaskStore {
    forest: Vec<Task>,
    history: History,
    sync: Reconciler,
}

impl TaskStore {
    /// Open the store described by `config` and load the local cache.
    pub fn open(config: &Config) -> Self {
        let cache = LocalCache::new(&config.data_dir, &config.storage_key, config.cache_quota_bytes);
        TaskStore::with_cache(cache, config.history_limit, config.autosave_interval())
    }

    pub fn with_cache(cache: LocalCache, history_limit: usize, autosave_interval: Duration) -> Self {
        let mut sync = Reconciler::new(cache, autosave_interval);
        let forest = sync.load_initial();
        let mut history = History::new(history_limit);
        history.checkpoint(&forest);
        TaskStore { forest, history, sync }
    }

    pub fn forest(&self) -> &[Task] {
        &self.forest
    }

    // ── Internal state transitions ──────────────────────────────────

    /// Accept a new forest from a mutation. Returns false if nothing changed.
    fn commit(&mut self, next: Vec<Task>) -> bool {
        if next == self.forest {
            return false;
        }
        self.forest = next;
        self.history.checkpoint(&self.forest);
        self.sync.after_change(&self.forest);
        true
    }

    /// Apply a forest handed out by undo/redo. Never checkpointed.
    fn restore(&mut self, forest: Vec<Task>) {
        self.forest = forest;
        self.sync.after_change(&self.forest);
    }

    /// Replace everything and start history over from the new state.
    fn replace_baseline(&mut self, forest: Vec<Task>) {
        self.forest = forest;
        self.history.rebaseline(&self.forest);
        self.sync.after_change(&self.forest);
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Add `task` as a new root. Returns its id.
    pub fn add_task(&mut self, task: Task) -> Result<String, TreeError> {
        let id = task.id.clone();
        let next = tree::insert_root(&self.forest, task)?;
        self.commit(next);
        info!(task = %id, "added task");
        Ok(id)
    }

    pub fn add_subtask(&mut self, parent_id: &str, title: &str) -> Result<String, TreeError> {
        let (next, id) = tree::insert_child(&self.forest, parent_id, title)?;
        self.commit(next);
        info!(task = %id, parent = parent_id, "added subtask");
        Ok(id)
    }

    /// Replace the content of a task. Its place in the tree is kept.
    pub fn update_task(&mut self, id: &str, value: Task) -> bool {
        match tree::update_by_id(&self.forest, id, value) {
            Some(next) => self.commit(next),
            None => false,
        }
    }

    /// Edit a task in place through a closure.
    pub fn modify_task(&mut self, id: &str, f: impl FnOnce(&mut Task)) -> bool {
        match tree::modify_by_id(&self.forest, id, f) {
            Some(next) => self.commit(next),
            None => false,
        }
    }

    /// Set a task's status. Marking an open recurring task done goes through
    /// [`TaskStore::toggle_complete`], so the next occurrence is spawned.
    pub fn set_status(&mut self, id: &str, status: Status) -> bool {
        let completes_recurring =
            status.is_done() && self.find(id).is_some_and(|t| !t.completed && t.is_recurring());
        if completes_recurring {
            return self.toggle_complete(id).is_ok();
        }
        self.modify_task(id, |t| t.set_status(status))
    }

    /// Flip completion as of today. See [`TaskStore::toggle_complete_on`].
    pub fn toggle_complete(&mut self, id: &str) -> Result<Option<String>, TreeError> {
        self.toggle_complete_on(id, Local::now().date_naive())
    }

    /// Flip completion. Completing a recurring task returns the id of the spawned
    /// next occurrence.
    pub fn toggle_complete_on(&mut self, id: &str, today: NaiveDate) -> Result<Option<String>, TreeError> {
        let (next, spawned) =
            recurrence::toggle_completion(&self.forest, id, today).ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        self.commit(next);
        Ok(spawned)
    }

    /// Delete a task and its subtree. Unknown ids are a no-op.
    pub fn delete_task(&mut self, id: &str) -> bool {
        match tree::delete_by_id(&self.forest, id) {
            Some((next, removed)) => {
                let mut count = 0;
                removed.walk(&mut |_| count += 1);
                info!(task = id, removed = count, "deleted task");
                self.commit(next)
            }
            None => false,
        }
    }

    pub fn reorder(&mut self, parent: Option<&str>, order: &[String]) -> Result<bool, TreeError> {
        let next = tree::reorder(&self.forest, parent, order)?;
        Ok(self.commit(next))
    }

    pub fn move_task(&mut self, id: &str, dest: Destination) -> Result<bool, TreeError> {
        let next = tree::move_task(&self.forest, id, dest)?;
        Ok(self.commit(next))
    }

    /// Author a note on a task. Returns the note id.
    pub fn add_note(&mut self, id: &str, content: &str) -> Result<String, TreeError> {
        let owner = tree::find_by_id(&self.forest, id).ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        let note = Note::new(content, owner);
        let note_id = note.id.clone();
        self.modify_task(id, |t| t.notes.push(note));
        Ok(note_id)
    }

    pub fn add_attachment(&mut self, id: &str, attachment: Attachment) -> Result<(), TreeError> {
        if self.modify_task(id, |t| t.attachments.push(attachment)) {
            Ok(())
        } else {
            Err(TreeError::NotFound(id.to_string()))
        }
    }

    /// Move the roots of a deleted project to the Inbox. Returns how many moved.
    pub fn clear_project(&mut self, project_id: &str) -> usize {
        let mut next = self.forest.clone();
        let mut moved = 0;
        for root in next.iter_mut().filter(|t| t.project_id.as_deref() == Some(project_id)) {
            root.project_id = None;
            tree::relink(root);
            moved += 1;
        }
        self.commit(next);
        moved
    }

    /// Strip a deleted label from every task. Returns how many tasks changed.
    pub fn remove_label(&mut self, label_id: &str) -> usize {
        fn strip(tasks: &mut [Task], label_id: &str, changed: &mut usize) {
            for t in tasks {
                let before = t.label_ids.len();
                t.label_ids.retain(|l| l != label_id);
                if t.label_ids.len() != before {
                    *changed += 1;
                }
                strip(&mut t.sub_tasks, label_id, changed);
            }
        }
        let mut next = self.forest.clone();
        let mut changed = 0;
        strip(&mut next, label_id, &mut changed);
        self.commit(next);
        changed
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn find(&self, id: &str) -> Option<&Task> {
        tree::find_by_id(&self.forest, id)
    }

    pub fn list(&self, filter: &TaskFilter, sort: SortKey) -> Vec<Task> {
        view::apply(&self.forest, filter, sort)
    }

    pub fn completion(&self) -> Completion {
        tree::count_completion(&self.forest)
    }

    /// Tasks and notes related to the task with `id`, best first.
    pub fn related(&self, id: &str) -> Option<Vec<(Entry, u32)>> {
        let target = Entry::from_task(self.find(id)?);
        let candidates = view::notebook_entries(&self.forest);
        Some(
            view::related(&target, &candidates)
                .into_iter()
                .map(|(e, score)| (e.clone(), score))
                .collect(),
        )
    }

    // ── History ─────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(forest) => {
                debug!(cursor = self.history.cursor(), "undo");
                self.restore(forest);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(forest) => {
                debug!(cursor = self.history.cursor(), "redo");
                self.restore(forest);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Snapshots with the index of the live one.
    pub fn history(&self) -> (Vec<&Snapshot>, usize) {
        (self.history.entries().collect(), self.history.cursor())
    }

    // ── Import / export ─────────────────────────────────────────────

    /// Replace the forest with a validated task file. On error nothing changes.
    pub fn import_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        let forest = transfer::import_bytes(bytes)?;
        let count = forest.len();
        self.replace_baseline(forest);
        info!(roots = count, "imported tasks");
        Ok(count)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<usize> {
        let bytes = std::fs::read(path)?;
        self.import_bytes(&bytes)
    }

    pub fn export_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = transfer::export_to_dir(&self.forest, dir, Local::now().date_naive())?;
        info!(path = %path.display(), "exported tasks");
        Ok(path)
    }

    // ── External target ─────────────────────────────────────────────

    /// Let the every-change autosave mode write the current forest.
    pub async fn flush(&mut self) {
        self.sync.flush(&self.forest).await;
    }

    /// Wait for the interval autosave timer. Pending forever when it is not running.
    pub async fn next_autosave_tick(&mut self) {
        self.sync.next_tick().await;
    }

    /// Handle one interval tick.
    pub async fn run_autosave(&mut self) {
        self.sync.on_tick(&self.forest).await;
    }

    pub async fn connect(&mut self, target: Arc<dyn ExternalTarget>) -> Result<(), TargetError> {
        self.sync.connect(target, &self.forest).await
    }

    pub fn disconnect(&mut self) {
        self.sync.disconnect();
    }

    pub fn set_autosave(&mut self, mode: AutosaveMode) {
        self.sync.set_autosave(mode);
    }

    pub async fn save_now(&mut self) -> Result<(), TargetError> {
        self.sync.save_now(&self.forest).await
    }

    /// Replace the forest with the external target's contents, validated like an
    /// import. Returns false if the target holds nothing yet.
    pub async fn load_now(&mut self) -> Result<bool, TargetError> {
        let Some(data) = self.sync.load_external().await? else {
            return Ok(false);
        };
        let forest = transfer::import_str(&data)?;
        info!(roots = forest.len(), "loaded tasks from external target");
        self.replace_baseline(forest);
        self.sync.mark_synced();
        Ok(true)
    }

    pub fn sync_report(&self) -> SyncReport {
        self.sync.report()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.sync.take_notices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::persist::sync::tests::MemoryTarget;
    use crate::persist::{Connection, SyncStatus};
    use crate::fields::{Priority, RecurrenceKind, MAX_DEPTH};
    use crate::task::Recurrence;
    use crate::persist::codec;
    use crate::view::Scope;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> TaskStore {
        TaskStore::with_cache(LocalCache::new(dir.path(), "tasks", None), 20, Duration::from_secs(300))
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_mutations_persist_to_cache() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let id = store.add_task(Task::new("Write report")).unwrap();
        store.add_subtask(&id, "Outline").unwrap();

        let reopened = open(&dir);
        assert_eq!(reopened.forest(), store.forest());
        assert_eq!(reopened.completion(), Completion { total: 2, completed: 0 });
    }

    #[test]
    fn test_history_three_mutations_two_undos_then_branch() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let id = store.add_task(Task::new("s0")).unwrap();
        assert!(!store.can_undo());

        store.modify_task(&id, |t| t.title = "m1".into());
        store.modify_task(&id, |t| t.title = "m2".into());
        store.modify_task(&id, |t| t.title = "m3".into());
        assert_eq!(store.history().1, 3);

        assert!(store.undo());
        assert!(store.undo());
        assert_eq!(store.find(&id).unwrap().title, "m1");
        assert!(store.can_redo());

        store.modify_task(&id, |t| t.priority = Priority::High);
        assert!(!store.can_redo());
        assert_eq!(store.history().1, 2);
    }

    #[test]
    fn test_undo_restores_are_not_checkpointed() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let id = store.add_task(Task::new("a")).unwrap();
        store.set_status(&id, Status::Done);
        let len = store.history().0.len();
        assert!(store.undo());
        assert_eq!(store.history().0.len(), len);
        assert!(store.redo());
        assert!(store.find(&id).unwrap().completed);
        // the restored state reached the cache too
        assert!(open(&dir).find(&id).unwrap().completed);
    }

    #[test]
    fn test_unchanged_forest_is_not_a_new_step() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let id = store.add_task(Task::new("a")).unwrap();
        store.set_status(&id, Status::Done);
        assert!(!store.set_status(&id, Status::Done));
        assert!(!store.delete_task("missing"));
        assert_eq!(store.history().0.len(), 2);
    }

    #[test]
    fn test_depth_limit_is_reported_not_applied() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let mut id = store.add_task(Task::new("root")).unwrap();
        for level in 1..=MAX_DEPTH {
            id = store.add_subtask(&id, &format!("level {level}")).unwrap();
        }
        let before = store.forest().to_vec();
        assert!(matches!(store.add_subtask(&id, "too deep"), Err(TreeError::MaxDepth { .. })));
        assert_eq!(store.forest(), before.as_slice());
    }

    #[test]
    fn test_archived_root_returns_when_reopened() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let root = store.add_task(Task::new("Move house")).unwrap();
        let a = store.add_subtask(&root, "Pack").unwrap();
        let b = store.add_subtask(&root, "Clean").unwrap();
        for id in [&root, &a, &b] {
            store.set_status(id, Status::Done);
        }
        assert!(store.list(&TaskFilter::default(), SortKey::Manual).is_empty());
        let archive = TaskFilter {
            scope: Scope::Archive,
            ..Default::default()
        };
        assert_eq!(titles(&store.list(&archive, SortKey::Manual)), ["Move house"]);

        store.set_status(&b, Status::Todo);
        assert_eq!(titles(&store.list(&TaskFilter::default(), SortKey::Manual)), ["Move house"]);
    }

    #[test]
    fn test_add_task_rejects_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let t = Task::new("Pay rent");
        store.add_task(t.clone()).unwrap();
        let steps = store.history().0.len();
        assert_eq!(store.add_task(t.clone()), Err(TreeError::DuplicateId(t.id.clone())));
        assert_eq!(store.forest().len(), 1);
        assert_eq!(store.history().0.len(), steps);
    }

    #[test]
    fn test_status_done_on_recurring_task_spawns_next() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let mut t = Task::new("Water plants");
        t.due_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        t.recurrence = Some(Recurrence { kind: RecurrenceKind::Daily, interval: 1 });
        let id = store.add_task(t).unwrap();

        assert!(store.set_status(&id, Status::Done));
        assert_eq!(store.forest().len(), 2);
        let original = store.find(&id).unwrap();
        assert!(original.completed);
        assert!(original.recurrence.is_none());
        let next = store.forest().iter().find(|t| t.id != id).unwrap();
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert!(!next.completed);

        // already completed: no second spawn
        assert!(!store.set_status(&id, Status::Done));
        assert_eq!(store.forest().len(), 2);
    }

    #[test]
    fn test_clear_project_moves_roots_to_inbox() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let mut t = Task::new("Quarterly review");
        t.project_id = Some("work".into());
        let id = store.add_task(t).unwrap();
        let sub = store.add_subtask(&id, "Collect numbers").unwrap();
        store.add_task(Task::new("Groceries")).unwrap();

        assert_eq!(store.clear_project("work"), 1);
        assert!(store.find(&id).unwrap().project_id.is_none());
        assert!(store.find(&sub).unwrap().project_id.is_none());
    }

    #[test]
    fn test_remove_label_at_every_depth() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let id = store.add_task(Task::new("a")).unwrap();
        let sub = store.add_subtask(&id, "b").unwrap();
        store.modify_task(&id, |t| t.label_ids = vec!["urgent".into(), "home".into()]);
        store.modify_task(&sub, |t| t.label_ids = vec!["urgent".into()]);
        assert_eq!(store.remove_label("urgent"), 2);
        assert_eq!(store.find(&id).unwrap().label_ids, vec!["home".to_string()]);
        assert!(store.find(&sub).unwrap().label_ids.is_empty());
    }

    #[test]
    fn test_notes_keep_origin_after_move() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let a = store.add_task(Task::new("Plan trip")).unwrap();
        let b = store.add_task(Task::new("Book flights")).unwrap();
        store.add_note(&b, "window seat").unwrap();
        store.move_task(&b, Destination::Under(a.clone())).unwrap();

        let root = store.find(&a).unwrap();
        let notes = view::collect_notes(root);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].origin_task_id, b);
        assert_eq!(notes[0].origin_task_title, "Book flights");
    }

    #[test]
    fn test_related_ranks_shared_words_and_project() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let mut a = Task::new("Garden fence repair");
        a.project_id = Some("home".into());
        let a = store.add_task(a).unwrap();
        let mut b = Task::new("Paint garden fence");
        b.project_id = Some("home".into());
        let b = store.add_task(b).unwrap();
        store.add_task(Task::new("Call dentist")).unwrap();

        let related = store.related(&a).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].0.id, b);
        assert_eq!(related[0].1, 2 * 2 + 3);
        assert!(store.related("missing").is_none());
    }

    #[test]
    fn test_import_rejection_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.add_task(Task::new("keep me")).unwrap();
        let before = store.forest().to_vec();

        let mut root = Task::new("r");
        let mut l1 = root.child("l1");
        let mut l2 = l1.child("l2");
        let mut l3 = l2.child("l3");
        let mut l4 = l3.child("l4");
        l4.depth = 4;
        l3.sub_tasks.push(l4);
        l2.sub_tasks.push(l3);
        l1.sub_tasks.push(l2);
        root.sub_tasks.push(l1);
        let data = codec::encode_forest(&[root]).unwrap();

        let err = store.import_bytes(data.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::Import(_)));
        assert_eq!(store.forest(), before.as_slice());
        assert_eq!(open(&dir).forest(), before.as_slice());
    }

    #[test]
    fn test_import_replaces_and_rebaselines() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let id = store.add_task(Task::new("old")).unwrap();
        store.set_status(&id, Status::Done);
        assert!(store.can_undo());

        let data = codec::encode_forest(&[Task::new("new")]).unwrap();
        assert_eq!(store.import_bytes(data.as_bytes()).unwrap(), 1);
        assert_eq!(titles(store.forest()), ["new"]);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_export_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.add_task(Task::new("a")).unwrap();
        let out = TempDir::new().unwrap();
        let path = store.export_to(out.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("tasks-export-") && name.ends_with(".json"));
        let back = transfer::import_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, store.forest());
    }

    #[tokio::test]
    async fn test_every_change_autosave_reaches_target() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let target = Arc::new(MemoryTarget::default());
        store.connect(target.clone()).await.unwrap();

        store.add_task(Task::new("a")).unwrap();
        assert_eq!(store.sync_report().status, SyncStatus::Pending);
        store.flush().await;
        assert_eq!(store.sync_report().status, SyncStatus::Synced);
        assert!(target.contents.lock().unwrap().as_deref().unwrap().contains("\"a\""));
    }

    #[tokio::test]
    async fn test_load_now_replaces_forest() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let target = Arc::new(MemoryTarget::default());
        store.connect(target.clone()).await.unwrap();
        store.add_task(Task::new("local")).unwrap();

        let remote = vec![Task::new("remote")];
        *target.contents.lock().unwrap() = Some(codec::encode_forest(&remote).unwrap());
        assert!(store.load_now().await.unwrap());
        assert_eq!(store.forest(), remote.as_slice());
        assert!(!store.can_undo());
        assert_eq!(store.sync_report().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_invalid_external_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let target = Arc::new(MemoryTarget::default());
        store.connect(target.clone()).await.unwrap();
        store.add_task(Task::new("local")).unwrap();
        *target.contents.lock().unwrap() = Some("{\"not\": \"a forest\"}".into());

        assert!(matches!(store.load_now().await, Err(TargetError::Import(_))));
        assert_eq!(titles(store.forest()), ["local"]);
    }

    #[tokio::test]
    async fn test_permission_loss_keeps_local_state() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let target = Arc::new(MemoryTarget::default());
        store.connect(target.clone()).await.unwrap();
        *target.revoked.lock().unwrap() = true;

        store.add_task(Task::new("a")).unwrap();
        store.flush().await;
        assert_eq!(store.sync_report().connection, Connection::Disconnected);
        assert!(matches!(store.take_notices()[..], [Notice::PermissionLost { .. }]));
        assert_eq!(titles(open(&dir).forest()), ["a"]);
    }

    #[test]
    fn test_quota_failure_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::with_cache(LocalCache::new(dir.path(), "tasks", Some(64)), 20, Duration::from_secs(300));
        store.add_task(Task::new("a title long enough to blow a sixty-four byte quota on its own")).unwrap();
        assert_eq!(store.forest().len(), 1);
        assert!(!store.sync_report().cache_ok);
        assert_eq!(store.take_notices(), vec![Notice::CacheQuotaExceeded]);
    }
}
