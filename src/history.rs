//! Snapshot-based undo/redo.
//!
//! The history is a bounded list of whole-forest snapshots with a cursor on the
//! one matching the live state. Restores handed out by `undo`/`redo` are never
//! fed back through `checkpoint`; the store applies them directly.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::task::Task;

/// Default number of snapshots kept.
pub const DEFAULT_LIMIT: usize = 20;

/// Immutable copy of the forest at a point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    forest: Vec<Task>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    fn new(forest: &[Task]) -> Self {
        Snapshot {
            forest: forest.to_vec(),
            taken_at: Utc::now(),
        }
    }

    pub fn forest(&self) -> &[Task] {
        &self.forest
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

#[derive(Debug)]
pub struct History {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        History {
            entries: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Whether the initial snapshot has been taken.
    pub fn is_armed(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    /// Record `forest` as the newest state. Returns whether a snapshot was added.
    ///
    /// Before the first non-empty forest arrives nothing is recorded. A forest
    /// equal to the snapshot under the cursor is skipped.
    pub fn checkpoint(&mut self, forest: &[Task]) -> bool {
        if !self.is_armed() {
            if forest.is_empty() {
                return false;
            }
            self.entries.push_back(Snapshot::new(forest));
            self.cursor = 0;
            tracing::debug!("history armed");
            return true;
        }
        if self.entries[self.cursor].forest == forest {
            return false;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(Snapshot::new(forest));
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        tracing::debug!(cursor = self.cursor, len = self.entries.len(), "checkpoint");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.is_armed() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.is_armed() && self.cursor + 1 < self.entries.len()
    }

    /// Step back and return the forest to restore.
    pub fn undo(&mut self) -> Option<Vec<Task>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].forest.clone())
    }

    /// Step forward and return the forest to restore.
    pub fn redo(&mut self) -> Option<Vec<Task>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].forest.clone())
    }

    /// Drop everything and start over from `forest` as the baseline.
    pub fn rebaseline(&mut self, forest: &[Task]) {
        self.entries.clear();
        self.cursor = 0;
        self.checkpoint(forest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(titles: &[&str]) -> Vec<Task> {
        titles.iter().map(|t| Task::new(*t)).collect()
    }

    #[test]
    fn test_unarmed_until_non_empty() {
        let mut h = History::default();
        assert!(!h.checkpoint(&[]));
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert!(h.checkpoint(&titled(&["a"])));
        assert!(h.is_armed());
        assert!(!h.can_undo());
    }

    #[test]
    fn test_three_mutations_two_undos_then_branch() {
        let s0 = titled(&["a"]);
        let mut s1 = s0.clone();
        s1.push(Task::new("b"));
        let mut s2 = s1.clone();
        s2.push(Task::new("c"));
        let mut s3 = s2.clone();
        s3.push(Task::new("d"));

        let mut h = History::default();
        h.checkpoint(&s0);
        h.checkpoint(&s1);
        h.checkpoint(&s2);
        h.checkpoint(&s3);
        assert_eq!(h.cursor(), 3);

        h.undo();
        let restored = h.undo().unwrap();
        assert_eq!(restored, s1);
        assert!(h.can_redo());

        let mut branch = s1.clone();
        branch.push(Task::new("e"));
        assert!(h.checkpoint(&branch));
        assert!(!h.can_redo());
        assert_eq!(h.len(), 3);
        assert_eq!(h.undo().unwrap(), s1);
    }

    #[test]
    fn test_duplicate_state_is_not_recorded() {
        let s0 = titled(&["a"]);
        let mut h = History::default();
        h.checkpoint(&s0);
        assert!(!h.checkpoint(&s0.clone()));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let mut h = History::new(3);
        let mut forest = Vec::new();
        for i in 0..5 {
            forest.push(Task::new(i.to_string()));
            h.checkpoint(&forest);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.cursor(), 2);
        let oldest = h.undo().and_then(|_| h.undo()).unwrap();
        assert_eq!(oldest.len(), 3);
        assert!(!h.can_undo());
    }

    #[test]
    fn test_redo_walks_forward() {
        let s0 = titled(&["a"]);
        let s1 = titled(&["b"]);
        let mut h = History::default();
        h.checkpoint(&s0);
        h.checkpoint(&s1);
        assert_eq!(h.undo().unwrap(), s0);
        assert_eq!(h.redo().unwrap(), s1);
        assert!(h.redo().is_none());
    }

    #[test]
    fn test_rebaseline_discards_history() {
        let mut h = History::default();
        h.checkpoint(&titled(&["a"]));
        h.checkpoint(&titled(&["b"]));
        h.rebaseline(&titled(&["imported"]));
        assert_eq!(h.len(), 1);
        assert!(!h.can_undo());
    }
}
