//! Import and export of task files.
//!
//! Export writes the same document the local cache holds. Import is the only
//! way foreign data enters the store, so it is strict: the raw JSON tree is
//! checked field by field, free text is sanitized, and any failure rejects the
//! whole file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::error::ImportError;
use crate::fields::MAX_DEPTH;
use crate::persist::cache::write_atomic;
use crate::persist::codec;
use crate::task::Task;

pub const MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;
const MAX_ROOTS: usize = 1_000;
const MAX_SUBTASKS: usize = 200;
const MAX_NOTES: usize = 500;
const MAX_ATTACHMENTS: usize = 50;
const MAX_LABELS: usize = 100;
const MAX_ID_LEN: usize = 64;
const MAX_TITLE_LEN: usize = 500;
const MAX_TEXT_LEN: usize = 10_000;
const MAX_NAME_LEN: usize = 255;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
static ACTIVE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?\s*(script|iframe|object|embed|style|link|meta|svg)\b[^>]*>").expect("valid regex")
});
static HANDLER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<[^>]*\bon[a-z]+\s*=[^>]*>").expect("valid regex"));
static JS_URI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("valid regex"));

/// Strip script-like content from free text.
///
/// Passes repeat until nothing changes, so a pattern split around another
/// one (`javajavascript:script:`) cannot reassemble after a removal.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let s = SCRIPT_BLOCK.replace_all(&current, "");
        let s = ACTIVE_TAG.replace_all(&s, "");
        let s = HANDLER_TAG.replace_all(&s, "");
        let next = JS_URI.replace_all(&s, "").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// `[A-Za-z0-9_-]{1,64}`
pub fn is_well_formed_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// File name for an export taken on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("tasks-export-{}.json", date.format("%Y-%m-%d"))
}

/// Write the forest to `<dir>/tasks-export-YYYY-MM-DD.json`.
pub fn export_to_dir(forest: &[Task], dir: &Path, date: NaiveDate) -> std::io::Result<PathBuf> {
    let path = dir.join(export_file_name(date));
    let data = codec::encode_forest(forest)?;
    write_atomic(&path, data.as_bytes())?;
    Ok(path)
}

pub fn import_str(data: &str) -> Result<Vec<Task>, ImportError> {
    import_bytes(data.as_bytes())
}

/// Validate, sanitize and decode a task file.
pub fn import_bytes(bytes: &[u8]) -> Result<Vec<Task>, ImportError> {
    if bytes.len() > MAX_IMPORT_BYTES {
        return Err(ImportError::TooLarge {
            bytes: bytes.len(),
            limit: MAX_IMPORT_BYTES,
        });
    }
    let mut value: Value = serde_json::from_slice(bytes)?;
    let roots = value
        .as_array_mut()
        .ok_or_else(|| ImportError::invalid("$", "expected an array of tasks"))?;
    if roots.len() > MAX_ROOTS {
        return Err(ImportError::invalid("$", format!("more than {MAX_ROOTS} tasks")));
    }
    for (i, node) in roots.iter_mut().enumerate() {
        check_task(node, &format!("$[{i}]"), 0, None)?;
    }

    let forest: Vec<Task> = serde_json::from_value(value)?;
    check_forest(&forest)?;
    Ok(forest)
}

// ── Raw tree checks ─────────────────────────────────────────────────

fn object<'a>(v: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, ImportError> {
    v.as_object_mut()
        .ok_or_else(|| ImportError::invalid(path, "expected an object"))
}

fn field<'a>(obj: &'a Map<String, Value>, path: &str, key: &str) -> Result<&'a Value, ImportError> {
    obj.get(key)
        .ok_or_else(|| ImportError::invalid(path, format!("missing field `{key}`")))
}

fn string<'a>(obj: &'a Map<String, Value>, path: &str, key: &str, max: usize) -> Result<&'a str, ImportError> {
    let s = field(obj, path, key)?
        .as_str()
        .ok_or_else(|| ImportError::invalid(path, format!("`{key}` must be a string")))?;
    if s.chars().count() > max {
        return Err(ImportError::invalid(path, format!("`{key}` longer than {max} characters")));
    }
    Ok(s)
}

fn id(obj: &Map<String, Value>, path: &str, key: &str) -> Result<(), ImportError> {
    let v = string(obj, path, key, MAX_ID_LEN)?;
    if !is_well_formed_id(v) {
        return Err(ImportError::invalid(path, format!("`{key}` is not a well-formed id")));
    }
    Ok(())
}

fn nullable_id(obj: &Map<String, Value>, path: &str, key: &str) -> Result<Option<String>, ImportError> {
    match field(obj, path, key)? {
        Value::Null => Ok(None),
        Value::String(s) if is_well_formed_id(s) => Ok(Some(s.clone())),
        _ => Err(ImportError::invalid(path, format!("`{key}` must be null or a well-formed id"))),
    }
}

fn array<'a>(obj: &'a Map<String, Value>, path: &str, key: &str, max: usize) -> Result<&'a Vec<Value>, ImportError> {
    let a = field(obj, path, key)?
        .as_array()
        .ok_or_else(|| ImportError::invalid(path, format!("`{key}` must be an array")))?;
    if a.len() > max {
        return Err(ImportError::invalid(path, format!("`{key}` has more than {max} entries")));
    }
    Ok(a)
}

fn kind(obj: &Map<String, Value>, path: &str, key: &str, check: fn(&Value) -> bool, what: &str) -> Result<(), ImportError> {
    if check(field(obj, path, key)?) {
        Ok(())
    } else {
        Err(ImportError::invalid(path, format!("`{key}` must be {what}")))
    }
}

fn sanitize_in_place(obj: &mut Map<String, Value>, key: &str) {
    if let Some(Value::String(s)) = obj.get_mut(key) {
        let clean = sanitize(s);
        if clean != *s {
            tracing::debug!(field = key, "stripped script-like content on import");
            *s = clean;
        }
    }
}

fn check_note(v: &mut Value, path: &str) -> Result<(), ImportError> {
    let obj = object(v, path)?;
    id(obj, path, "id")?;
    string(obj, path, "content", MAX_TEXT_LEN)?;
    kind(obj, path, "createdAt", Value::is_object, "a tagged date")?;
    id(obj, path, "originTaskId")?;
    string(obj, path, "originTaskTitle", MAX_TITLE_LEN)?;
    sanitize_in_place(obj, "content");
    sanitize_in_place(obj, "originTaskTitle");
    Ok(())
}

fn check_attachment(v: &mut Value, path: &str) -> Result<(), ImportError> {
    let obj = object(v, path)?;
    id(obj, path, "id")?;
    string(obj, path, "name", MAX_NAME_LEN)?;
    string(obj, path, "mimeType", MAX_NAME_LEN)?;
    kind(obj, path, "data", Value::is_string, "a base64 string")?;
    kind(obj, path, "size", Value::is_u64, "a non-negative integer")?;
    kind(obj, path, "createdAt", Value::is_object, "a tagged date")?;
    sanitize_in_place(obj, "name");
    Ok(())
}

fn check_task(v: &mut Value, path: &str, depth: u8, parent: Option<&str>) -> Result<(), ImportError> {
    let obj = object(v, path)?;
    id(obj, path, "id")?;
    string(obj, path, "title", MAX_TITLE_LEN)?;
    string(obj, path, "description", MAX_TEXT_LEN)?;
    kind(obj, path, "status", Value::is_string, "a string")?;
    kind(obj, path, "priority", Value::is_string, "a string")?;
    kind(obj, path, "completed", Value::is_boolean, "a boolean")?;
    kind(obj, path, "dueDate", |v| v.is_null() || v.is_object(), "null or a tagged date")?;
    kind(obj, path, "recurrence", |v| v.is_null() || v.is_object(), "null or an object")?;
    kind(obj, path, "createdAt", Value::is_object, "a tagged date")?;
    array(obj, path, "notes", MAX_NOTES)?;
    array(obj, path, "attachments", MAX_ATTACHMENTS)?;
    let subs = array(obj, path, "subTasks", MAX_SUBTASKS)?;
    if depth == MAX_DEPTH && !subs.is_empty() {
        return Err(ImportError::invalid(path, format!("subtasks below the maximum depth {MAX_DEPTH}")));
    }
    let labels = array(obj, path, "labelIds", MAX_LABELS)?;
    if !labels.iter().all(|l| l.as_str().is_some_and(is_well_formed_id)) {
        return Err(ImportError::invalid(path, "`labelIds` must hold well-formed ids"));
    }
    nullable_id(obj, path, "projectId")?;

    let stored_depth = field(obj, path, "depth")?.as_u64();
    if stored_depth != Some(u64::from(depth)) {
        return Err(ImportError::invalid(
            path,
            format!("`depth` is {stored_depth:?} but the task is nested at depth {depth}"),
        ));
    }
    if nullable_id(obj, path, "parentId")?.as_deref() != parent {
        return Err(ImportError::invalid(path, "`parentId` does not match the enclosing task"));
    }

    sanitize_in_place(obj, "title");
    sanitize_in_place(obj, "description");

    let own_id = obj.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    for (key, check) in [
        ("notes", check_note as fn(&mut Value, &str) -> Result<(), ImportError>),
        ("attachments", check_attachment),
    ] {
        if let Some(Value::Array(items)) = obj.get_mut(key) {
            for (i, item) in items.iter_mut().enumerate() {
                check(item, &format!("{path}.{key}[{i}]"))?;
            }
        }
    }
    if let Some(Value::Array(children)) = obj.get_mut("subTasks") {
        for (i, child) in children.iter_mut().enumerate() {
            check_task(child, &format!("{path}.subTasks[{i}]"), depth + 1, Some(&own_id))?;
        }
    }
    Ok(())
}

// ── Decoded forest checks ───────────────────────────────────────────

fn check_forest(forest: &[Task]) -> Result<(), ImportError> {
    let mut seen = HashSet::new();
    let mut problem = None;
    for root in forest {
        root.walk(&mut |t| {
            if problem.is_some() {
                return;
            }
            if !seen.insert(t.id.as_str()) {
                problem = Some((t.id.clone(), "duplicate id".to_string()));
            } else if t.completed != t.status.is_done() {
                problem = Some((t.id.clone(), "`completed` disagrees with `status`".to_string()));
            } else if t.recurrence.is_some_and(|r| r.is_active() && r.interval == 0) {
                problem = Some((t.id.clone(), "recurrence interval must be positive".to_string()));
            } else if let Some(a) = t.attachments.iter().find(|a| a.bytes().ok().map(|b| b.len() as u64) != Some(a.size)) {
                problem = Some((t.id.clone(), format!("attachment `{}` payload does not match its size", a.name)));
            }
        });
    }
    match problem {
        Some((id, reason)) => Err(ImportError::invalid(format!("task {id}"), reason)),
        None => Ok(()),
    }
}
