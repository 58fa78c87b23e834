//! Projects and labels.
//!
//! Both are flat maps from id to a display name and optional color, stored
//! together in `<data_dir>/directory.json`. Tasks refer to them by id only; the
//! store never looks inside.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, StorageError};
use crate::persist::cache::write_atomic;

pub const DIRECTORY_FILE_NAME: &str = "directory.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryItem {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Which of the two maps an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Project,
    Label,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub projects: BTreeMap<String, DirectoryItem>,
    #[serde(default)]
    pub labels: BTreeMap<String, DirectoryItem>,
}

impl Directory {
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(DIRECTORY_FILE_NAME)
    }

    /// Load from file. A missing file is an empty directory.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Directory::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(self)?;
        write_atomic(path, data.as_bytes())?;
        Ok(())
    }

    fn map(&self, kind: Kind) -> &BTreeMap<String, DirectoryItem> {
        match kind {
            Kind::Project => &self.projects,
            Kind::Label => &self.labels,
        }
    }

    fn map_mut(&mut self, kind: Kind) -> &mut BTreeMap<String, DirectoryItem> {
        match kind {
            Kind::Project => &mut self.projects,
            Kind::Label => &mut self.labels,
        }
    }

    /// Add an entry named `name`. Its id is the slug of the name.
    pub fn add(&mut self, kind: Kind, name: &str, color: Option<String>) -> Result<String, DirectoryError> {
        let id = slugify(name);
        if id.is_empty() {
            return Err(DirectoryError::EmptyName);
        }
        let map = self.map_mut(kind);
        if map.contains_key(&id) {
            return Err(DirectoryError::Exists(name.trim().to_string()));
        }
        map.insert(
            id.clone(),
            DirectoryItem {
                name: name.trim().to_string(),
                color,
            },
        );
        Ok(id)
    }

    /// Remove an entry by id or name. Returns the removed id so the caller can
    /// clear it from tasks.
    pub fn remove(&mut self, kind: Kind, id_or_name: &str) -> Result<String, DirectoryError> {
        let id = self
            .resolve(kind, id_or_name)
            .ok_or_else(|| DirectoryError::NotFound(id_or_name.to_string()))?;
        self.map_mut(kind).remove(&id);
        Ok(id)
    }

    pub fn get(&self, kind: Kind, id: &str) -> Option<&DirectoryItem> {
        self.map(kind).get(id)
    }

    pub fn iter(&self, kind: Kind) -> impl Iterator<Item = (&String, &DirectoryItem)> {
        self.map(kind).iter()
    }

    /// Find an id from either the id itself or a case-insensitive display name.
    pub fn resolve(&self, kind: Kind, id_or_name: &str) -> Option<String> {
        let map = self.map(kind);
        if map.contains_key(id_or_name) {
            return Some(id_or_name.to_string());
        }
        let wanted = id_or_name.trim().to_lowercase();
        map.iter()
            .find(|(_, item)| item.name.to_lowercase() == wanted)
            .map(|(id, _)| id.clone())
            .or_else(|| {
                let slug = slugify(id_or_name);
                map.contains_key(&slug).then_some(slug)
            })
    }

    /// Display name for an id, falling back to the id itself.
    pub fn name_of<'a>(&'a self, kind: Kind, id: &'a str) -> &'a str {
        self.get(kind, id).map(|i| i.name.as_str()).unwrap_or(id)
    }
}

/// Convert a display name to an id: lowercase alphanumerics joined by underscores.
pub fn slugify(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Project"), "my_project");
        assert_eq!(slugify("Test-Project_123"), "test_project_123");
        assert_eq!(slugify("Special!@#$%Characters"), "special_characters");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple_spaces");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_add_resolve_remove() {
        let mut d = Directory::default();
        let id = d.add(Kind::Project, "Home Renovation", Some("#aa5500".into())).unwrap();
        assert_eq!(id, "home_renovation");
        assert_eq!(d.add(Kind::Project, "home renovation", None), Err(DirectoryError::Exists("home renovation".into())));
        assert_eq!(d.add(Kind::Label, "  ", None), Err(DirectoryError::EmptyName));

        assert_eq!(d.resolve(Kind::Project, "HOME RENOVATION").as_deref(), Some("home_renovation"));
        assert_eq!(d.resolve(Kind::Project, "home_renovation").as_deref(), Some("home_renovation"));
        assert!(d.resolve(Kind::Label, "home_renovation").is_none());
        assert_eq!(d.name_of(Kind::Project, &id), "Home Renovation");

        assert_eq!(d.remove(Kind::Project, "Home Renovation").unwrap(), "home_renovation");
        assert!(d.remove(Kind::Project, "home_renovation").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = Directory::path_in(dir.path());
        assert_eq!(Directory::load(&path).unwrap(), Directory::default());

        let mut d = Directory::default();
        d.add(Kind::Label, "errand", None).unwrap();
        d.save(&path).unwrap();
        assert_eq!(Directory::load(&path).unwrap(), d);
    }
}
