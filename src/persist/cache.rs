//! Local cache: an always-available key/value store on disk.
//!
//! Each key maps to one JSON document `<dir>/<key>.json`. Writes are
//! synchronous and atomic (temp file + rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::fields::AutosaveMode;
use crate::persist::codec;
use crate::task::Task;

/// Settings that survive restarts. The external handle itself never does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceSettings {
    pub autosave: AutosaveMode,
    /// Display name of the last granted external location.
    pub external_name: Option<String>,
}

/// Write `data` to `path` via a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(data)?;
    f.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
    key: String,
    quota: Option<u64>,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>, quota: Option<u64>) -> Self {
        LocalCache {
            dir: dir.into(),
            key: key.into(),
            quota,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn settings_key(&self) -> String {
        format!("{}-settings", self.key)
    }

    pub fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, key: &str, data: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let bytes = data.len() as u64;
            if bytes > quota {
                return Err(StorageError::QuotaExceeded { bytes, quota });
            }
        }
        write_atomic(&self.path_for(key), data.as_bytes())?;
        Ok(())
    }

    /// Load the forest. A missing document is an empty forest.
    pub fn load_forest(&self) -> Result<Vec<Task>, StorageError> {
        match self.read(&self.key)? {
            Some(data) => Ok(codec::decode_forest(&data)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_forest(&self, forest: &[Task]) -> Result<(), StorageError> {
        let data = codec::encode_forest(forest)?;
        self.write(&self.key, &data)
    }

    /// Move an unreadable document aside so a fresh one can be written.
    pub fn quarantine(&self) -> std::io::Result<PathBuf> {
        let from = self.path_for(&self.key);
        let to = self.dir.join(format!("{}.corrupt.json", self.key));
        fs::rename(&from, &to)?;
        Ok(to)
    }

    pub fn load_settings(&self) -> Result<PersistenceSettings, StorageError> {
        match self.read(&self.settings_key())? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(PersistenceSettings::default()),
        }
    }

    pub fn save_settings(&self, settings: &PersistenceSettings) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(settings)?;
        self.write(&self.settings_key(), &data)
    }
}
