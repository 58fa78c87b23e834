//! Configuration loading.
//!
//! The data directory is resolved first (`--data-dir`, then `TASKFOREST_DIR`,
//! then `~/.taskforest`). Everything else comes from `<data_dir>/config.json`,
//! with missing fields falling back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::history::DEFAULT_LIMIT;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATA_DIR_ENV: &str = "TASKFOREST_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where the cache, settings and directory files live. Never read from the file.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Key of the cached forest document.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Refuse cache documents larger than this.
    #[serde(default)]
    pub cache_quota_bytes: Option<u64>,

    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_key: default_storage_key(),
            history_limit: default_history_limit(),
            cache_quota_bytes: None,
            autosave_interval_secs: default_autosave_interval(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskforest")
}

fn default_storage_key() -> String {
    "taskforest-tasks".to_string()
}

fn default_history_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_autosave_interval() -> u64 {
    300 // 5 minutes
}

impl Config {
    /// Resolve the data directory and read its config file if present.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        Self::load_from(&data_dir)
    }

    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(StoreError::Config)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Ensure the data directory exists.
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }
}
