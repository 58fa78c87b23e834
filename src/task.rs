//! Task data structure and related functionality.
//!
//! This module defines the recursive `Task` node that makes up the forest,
//! together with the notes, attachments and recurrence rules hanging off it.
//! The structural rules (depth, parent links, id uniqueness) are enforced by
//! the operations in `tree`; this module only carries shape and constructors.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::*;
use crate::persist::codec;

/// Generate a fresh opaque id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A node in the task forest.
///
/// `completed` mirrors `status == Done`; every mutation path calls
/// [`Task::normalize`] instead of trusting the stored flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub completed: bool,
    #[serde(default, with = "codec::date_opt")]
    pub due_date: Option<NaiveDate>,
    pub notes: Vec<Note>,
    pub attachments: Vec<Attachment>,
    pub sub_tasks: Vec<Task>,
    pub depth: u8,
    pub parent_id: Option<String>,
    pub project_id: Option<String>,
    pub label_ids: Vec<String>,
    pub recurrence: Option<Recurrence>,
    #[serde(with = "codec::datetime")]
    pub created_at: DateTime<Utc>,
}

/// A note authored on a task. The origin tag survives being viewed from an
/// ancestor and survives moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(with = "codec::datetime")]
    pub created_at: DateTime<Utc>,
    pub origin_task_id: String,
    pub origin_task_title: String,
}

/// Inline binary attachment. `data` is base64, `size` the decoded length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub data: String,
    pub size: u64,
    #[serde(with = "codec::datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    pub interval: u32,
}

impl Recurrence {
    /// Whether this rule spawns a next occurrence.
    pub fn is_active(&self) -> bool {
        self.kind != RecurrenceKind::None
    }
}

impl Task {
    /// Create a root-level task with default fields.
    pub fn new(title: impl Into<String>) -> Self {
        Task {
            id: new_id(),
            title: title.into(),
            description: String::new(),
            status: Status::Todo,
            priority: Priority::default(),
            completed: false,
            due_date: None,
            notes: Vec::new(),
            attachments: Vec::new(),
            sub_tasks: Vec::new(),
            depth: 0,
            parent_id: None,
            project_id: None,
            label_ids: Vec::new(),
            recurrence: None,
            created_at: Utc::now(),
        }
    }

    /// Create a task shaped as a direct child of `self`. Does not attach it.
    pub fn child(&self, title: impl Into<String>) -> Self {
        let mut t = Task::new(title);
        t.depth = self.depth + 1;
        t.parent_id = Some(self.id.clone());
        t.project_id = self.project_id.clone();
        t
    }

    /// Re-derive `completed` from `status`.
    pub fn normalize(&mut self) {
        self.completed = self.status.is_done();
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.normalize();
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.map(|r| r.is_active()).unwrap_or(false)
    }

    /// Visit this node and every descendant, depth-first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Task)) {
        f(self);
        for c in &self.sub_tasks {
            c.walk(f);
        }
    }
}

impl Note {
    pub fn new(content: impl Into<String>, origin: &Task) -> Self {
        Note {
            id: new_id(),
            content: content.into(),
            created_at: Utc::now(),
            origin_task_id: origin.id.clone(),
            origin_task_title: origin.title.clone(),
        }
    }
}

impl Attachment {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Attachment {
            id: new_id(),
            name: name.into(),
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        }
    }

    /// Decode the inline payload.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data)
    }
}
