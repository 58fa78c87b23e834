//! Tree manipulation operations for the task forest.
//!
//! Every public function here is pure: it borrows the current forest and hands
//! back a new one (copy-on-write), leaving the input untouched for history
//! snapshots. Failures come back as `None` or a [`TreeError`] so a stale id from
//! the caller never panics.

use std::collections::{HashMap, HashSet};

use crate::error::TreeError;
use crate::fields::MAX_DEPTH;
use crate::task::Task;

pub type Forest = Vec<Task>;

/// Completion counts across every depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    pub total: usize,
    pub completed: usize,
}

/// Where a moved task lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Root level of the given project (`None` is the Inbox).
    Root { project_id: Option<String> },
    /// Last child of the given task.
    Under(String),
}

// ── Find operations ─────────────────────────────────────────────────

/// Find a task at any depth.
pub fn find_by_id<'a>(forest: &'a [Task], id: &str) -> Option<&'a Task> {
    for task in forest {
        if task.id == id {
            return Some(task);
        }
        if let Some(found) = find_by_id(&task.sub_tasks, id) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(forest: &'a mut [Task], id: &str) -> Option<&'a mut Task> {
    for task in forest {
        if task.id == id {
            return Some(task);
        }
        if let Some(found) = find_mut(&mut task.sub_tasks, id) {
            return Some(found);
        }
    }
    None
}

/// The sibling list under `parent`, or the root list.
pub(crate) fn siblings_mut<'a>(forest: &'a mut Vec<Task>, parent: Option<&str>) -> Option<&'a mut Vec<Task>> {
    match parent {
        None => Some(forest),
        Some(pid) => find_mut(forest, pid).map(|p| &mut p.sub_tasks),
    }
}

pub fn depth_of(forest: &[Task], id: &str) -> Option<u8> {
    find_by_id(forest, id).map(|t| t.depth)
}

/// Levels below `task`; a leaf has height 0.
pub fn subtree_height(task: &Task) -> u8 {
    task.sub_tasks
        .iter()
        .map(|c| 1 + subtree_height(c))
        .max()
        .unwrap_or(0)
}

/// Collect every id in the forest.
pub fn all_ids(forest: &[Task]) -> HashSet<&str> {
    let mut ids = HashSet::new();
    for root in forest {
        root.walk(&mut |t| {
            ids.insert(t.id.as_str());
        });
    }
    ids
}

// ── Update operations ───────────────────────────────────────────────

/// Replace the content of the task with `id`.
///
/// The node keeps its identity and place in the tree: id, depth, parent link
/// and subtree come from the existing node. `completed` is re-derived from the
/// new status, and a root's project is pushed down to its descendants.
pub fn update_by_id(forest: &[Task], id: &str, new_value: Task) -> Option<Forest> {
    let mut out = forest.to_vec();
    let slot = find_mut(&mut out, id)?;
    let mut value = new_value;
    value.id = std::mem::take(&mut slot.id);
    value.depth = slot.depth;
    value.parent_id = slot.parent_id.take();
    if value.parent_id.is_some() {
        // subtasks follow their root's project
        value.project_id = slot.project_id.take();
    }
    value.sub_tasks = std::mem::take(&mut slot.sub_tasks);
    value.normalize();
    relink(&mut value);
    *slot = value;
    Some(out)
}

/// Apply `f` to a copy of the task with `id` and store the result.
pub fn modify_by_id(forest: &[Task], id: &str, f: impl FnOnce(&mut Task)) -> Option<Forest> {
    let mut value = find_by_id(forest, id)?.clone();
    f(&mut value);
    update_by_id(forest, id, value)
}

/// Reset depth, parent links and project on every descendant of `task`.
pub(crate) fn relink(task: &mut Task) {
    for child in &mut task.sub_tasks {
        child.depth = task.depth + 1;
        child.parent_id = Some(task.id.clone());
        child.project_id = task.project_id.clone();
        relink(child);
    }
}

// ── Add/Remove operations ───────────────────────────────────────────

/// First id in `task`'s subtree that is already taken, either in `forest` or
/// by an earlier node of the subtree itself.
fn clashing_id(forest: &[Task], task: &Task) -> Option<String> {
    let mut taken = all_ids(forest);
    let mut clash = None;
    task.walk(&mut |t| {
        if clash.is_none() && !taken.insert(t.id.as_str()) {
            clash = Some(t.id.clone());
        }
    });
    clash
}

/// Append a new root task. Depth and parent link are reset.
///
/// Rejects a subtree taller than `MAX_DEPTH` allows and any id already in use.
pub fn insert_root(forest: &[Task], task: Task) -> Result<Forest, TreeError> {
    if subtree_height(&task) > MAX_DEPTH {
        return Err(TreeError::MaxDepth {
            id: task.id.clone(),
            depth: 0,
        });
    }
    if let Some(id) = clashing_id(forest, &task) {
        return Err(TreeError::DuplicateId(id));
    }
    let mut task = task;
    task.depth = 0;
    task.parent_id = None;
    task.normalize();
    relink(&mut task);
    let mut out = forest.to_vec();
    out.push(task);
    Ok(out)
}

/// Append `child` under `parent_id`, fixing its depth, parent and project.
pub fn attach_child(forest: &[Task], parent_id: &str, child: Task) -> Result<Forest, TreeError> {
    let parent = find_by_id(forest, parent_id).ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
    if parent.depth + 1 + subtree_height(&child) > MAX_DEPTH {
        return Err(TreeError::MaxDepth {
            id: parent.id.clone(),
            depth: parent.depth,
        });
    }
    if let Some(id) = clashing_id(forest, &child) {
        return Err(TreeError::DuplicateId(id));
    }
    let mut out = forest.to_vec();
    let parent = find_mut(&mut out, parent_id).ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
    let mut child = child;
    child.depth = parent.depth + 1;
    child.parent_id = Some(parent.id.clone());
    child.project_id = parent.project_id.clone();
    child.normalize();
    relink(&mut child);
    parent.sub_tasks.push(child);
    Ok(out)
}

/// Add a new subtask titled `title` under `parent_id`. Returns the new id.
pub fn insert_child(forest: &[Task], parent_id: &str, title: &str) -> Result<(Forest, String), TreeError> {
    let parent = find_by_id(forest, parent_id).ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
    let child = parent.child(title);
    let id = child.id.clone();
    Ok((attach_child(forest, parent_id, child)?, id))
}

/// Remove a task and its whole subtree from whichever level holds it.
/// Returns the new forest and the removed subtree.
pub fn delete_by_id(forest: &[Task], id: &str) -> Option<(Forest, Task)> {
    fn remove_from(tasks: &mut Vec<Task>, id: &str) -> Option<Task> {
        if let Some(pos) = tasks.iter().position(|t| t.id == id) {
            return Some(tasks.remove(pos));
        }
        tasks.iter_mut().find_map(|t| remove_from(&mut t.sub_tasks, id))
    }

    let mut out = forest.to_vec();
    let removed = remove_from(&mut out, id)?;
    Some((out, removed))
}

// ── Restructure operations ──────────────────────────────────────────

/// Reorder one sibling list. `order` must be a permutation of its ids.
pub fn reorder(forest: &[Task], parent: Option<&str>, order: &[String]) -> Result<Forest, TreeError> {
    let mut out = forest.to_vec();
    let list = siblings_mut(&mut out, parent)
        .ok_or_else(|| TreeError::NotFound(parent.unwrap_or_default().to_string()))?;

    let unique: HashSet<&str> = order.iter().map(String::as_str).collect();
    if order.len() != list.len() || unique.len() != order.len() {
        return Err(TreeError::InvalidOrder);
    }
    let mut by_id: HashMap<String, Task> = std::mem::take(list).into_iter().map(|t| (t.id.clone(), t)).collect();
    let mut reordered = Vec::with_capacity(order.len());
    for id in order {
        reordered.push(by_id.remove(id).ok_or(TreeError::InvalidOrder)?);
    }
    *list = reordered;
    Ok(out)
}

/// Move a task (with its subtree) to a new parent or to the root of a project.
///
/// Depth, parent links and project are recomputed for the moved node and every
/// descendant. Fails without touching anything if the subtree would end up
/// deeper than `MAX_DEPTH` or if the destination lies inside the moved subtree.
pub fn move_task(forest: &[Task], id: &str, dest: Destination) -> Result<Forest, TreeError> {
    let node = find_by_id(forest, id).ok_or_else(|| TreeError::NotFound(id.to_string()))?;

    let (new_depth, new_parent, project_id) = match &dest {
        Destination::Root { project_id } => (0, None, project_id.clone()),
        Destination::Under(pid) => {
            if pid == id || find_by_id(&node.sub_tasks, pid).is_some() {
                return Err(TreeError::MoveIntoSelf(id.to_string()));
            }
            let parent = find_by_id(forest, pid).ok_or_else(|| TreeError::NotFound(pid.clone()))?;
            (parent.depth + 1, Some(pid.clone()), parent.project_id.clone())
        }
    };
    if new_depth + subtree_height(node) > MAX_DEPTH {
        return Err(TreeError::MaxDepth {
            id: id.to_string(),
            depth: new_depth,
        });
    }

    let (mut out, mut moved) = delete_by_id(forest, id).ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    moved.depth = new_depth;
    moved.parent_id = new_parent.clone();
    moved.project_id = project_id;
    relink(&mut moved);

    siblings_mut(&mut out, new_parent.as_deref())
        .ok_or_else(|| TreeError::NotFound(new_parent.clone().unwrap_or_default()))?
        .push(moved);
    Ok(out)
}

// ── Statistics ──────────────────────────────────────────────────────

/// Count every task and every completed task at every depth.
pub fn count_completion(forest: &[Task]) -> Completion {
    let mut c = Completion::default();
    for root in forest {
        root.walk(&mut |t| {
            c.total += 1;
            if t.completed {
                c.completed += 1;
            }
        });
    }
    c
}
